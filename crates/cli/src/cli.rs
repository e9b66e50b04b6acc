//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// Point cloud ingestion - pose-aware point cloud integration pipeline
#[derive(Parser, Debug)]
#[command(
    name = "pointcloud-ingest",
    author,
    version,
    about = "Point cloud ingestion, motion undistortion and map integration pipeline",
    long_about = "Ingests point clouds from one or more inputs, resolves their poses from a \n\
                  transform buffer (optionally compensating sensor motion), and integrates \n\
                  them into the configured map integrators in arrival order."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "POINTCLOUD_INGEST_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (falls back to `observability.log_format`, then pretty)
    #[arg(long, value_enum, global = true, env = "POINTCLOUD_INGEST_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline against simulated sensors and trajectory
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "pipeline.toml",
        env = "POINTCLOUD_INGEST_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the world frame from configuration
    #[arg(long)]
    pub world_frame: Option<String>,

    /// Stop after this many integrated clouds across all inputs (0 = unlimited)
    #[arg(long, default_value = "0", env = "POINTCLOUD_INGEST_MAX_CLOUDS")]
    pub max_clouds: u64,

    /// Pipeline timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "POINTCLOUD_INGEST_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled, unset = from configuration)
    #[arg(long, env = "POINTCLOUD_INGEST_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show debug output configuration per input
    #[arg(long)]
    pub outputs: bool,

    /// Show simulation parameters
    #[arg(long)]
    pub simulation: bool,
}

impl Commands {
    /// Configuration file the command operates on
    pub fn config_path(&self) -> &Path {
        match self {
            Self::Run(args) => &args.config,
            Self::Validate(args) => &args.config,
            Self::Info(args) => &args.config,
        }
    }
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
