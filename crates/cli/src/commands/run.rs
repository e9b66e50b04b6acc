//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::PipelineBlueprint;
use std::time::Duration;
use tracing::{error, info};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref world_frame) = args.world_frame {
        info!(world_frame = %world_frame, "Overriding world frame from CLI");
        blueprint.world_frame = world_frame.clone();
        config_loader::ConfigLoader::validate(&blueprint)
            .context("Invalid world frame override")?;
    }

    info!(
        world_frame = %blueprint.world_frame,
        inputs = blueprint.inputs.len(),
        integrators = blueprint.integrators.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let metrics_port = resolve_metrics_port(args.metrics_port, &blueprint);
    let pipeline_config = PipelineConfig {
        blueprint,
        max_clouds: (args.max_clouds > 0).then_some(args.max_clouds),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        metrics_port,
    };

    let pipeline = Pipeline::new(pipeline_config);

    info!("Starting pipeline...");
    let stats = pipeline
        .run(setup_shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        clouds_integrated = stats.clouds_integrated(),
        clouds_dropped = stats.clouds_dropped(),
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Pipeline completed successfully"
    );
    stats.print_summary();

    info!("Pointcloud ingest finished");
    Ok(())
}

/// The CLI flag wins (0 disables), otherwise the configuration decides
fn resolve_metrics_port(flag: Option<u16>, blueprint: &PipelineBlueprint) -> Option<u16> {
    match flag {
        Some(0) => None,
        Some(port) => Some(port),
        None => blueprint.observability.metrics_port.filter(|&port| port != 0),
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("World frame: {}", blueprint.world_frame);

    println!("\nInputs ({}):", blueprint.inputs.len());
    for input in &blueprint.inputs {
        println!(
            "  - {} ({}) queue={} retry={}s max_wait={}s undistort={}",
            input.topic_name,
            input.topic_type,
            input.topic_queue_length,
            input.processing_retry_period,
            input.max_wait_for_pose,
            input.undistort_motion
        );
        if let Some(ref frame) = input.sensor_frame_id {
            println!("      sensor frame override: {}", frame);
        }
    }

    if blueprint.integrators.is_empty() {
        println!("\nIntegrators: none (log integrator will be used)");
    } else {
        println!("\nIntegrators ({}):", blueprint.integrators.len());
        for integrator in &blueprint.integrators {
            println!("  - {} ({:?})", integrator.name, integrator.integrator_type);
        }
    }

    let sim = &blueprint.simulation;
    println!("\nSimulation:");
    println!(
        "  Clouds: {} Hz, {} points, {} ms scans",
        sim.cloud_rate_hz, sim.points_per_cloud, sim.scan_duration_ms
    );
    println!(
        "  Poses: {} Hz, {} ms latency, {} s history",
        sim.pose_rate_hz, sim.pose_latency_ms, sim.pose_history_s
    );

    println!();
}
