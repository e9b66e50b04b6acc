//! # Pointcloud Ingest CLI
//!
//! 命令行接口入口点。
//!
//! 提供：
//! - 配置加载与验证
//! - 管道编排与生命周期管理
//! - 优雅关闭处理

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::{LogFormat, ObservabilityConfig};
use tracing::info;

use cli::{Cli, Commands};
use commands::{run_info, run_pipeline, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Pointcloud ingest CLI starting"
    );

    let result = match &cli.command {
        Commands::Run(args) => run_pipeline(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Command failed");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: resolve_log_format(cli),
        // `run` installs the exporter once the configuration is known
        metrics_port: None,
        default_log_level: default_log_level.to_string(),
    })
}

/// Command line flag first, then the configuration file, then pretty
fn resolve_log_format(cli: &Cli) -> LogFormat {
    if let Some(format) = cli.log_format {
        return format.into();
    }
    config_loader::ConfigLoader::load_from_path(cli.command.config_path())
        .ok()
        .filter(|blueprint| blueprint.observability.log_format.is_some())
        .and_then(|blueprint| ObservabilityConfig::from_settings(&blueprint.observability).ok())
        .map(|config| config.log_format)
        .unwrap_or(LogFormat::Pretty)
}
