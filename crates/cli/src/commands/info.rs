//! `info` command implementation.

use std::collections::HashMap;

use anyhow::{Context, Result};
use contracts::{DebugOutputConfig, PipelineBlueprint, SimulationConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    world_frame: String,
    inputs: Vec<InputInfo>,
    integrators: Vec<IntegratorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    simulation: Option<SimulationConfig>,
}

#[derive(Serialize)]
struct InputInfo {
    topic_name: String,
    topic_type: String,
    queue_length: usize,
    retry_period_s: f64,
    max_wait_for_pose_s: f64,
    undistort_motion: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    sensor_frame_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    outputs: Vec<OutputInfo>,
}

#[derive(Serialize)]
struct OutputInfo {
    kind: &'static str,
    name: String,
    sink_type: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    params: HashMap<String, String>,
}

#[derive(Serialize)]
struct IntegratorInfo {
    name: String,
    integrator_type: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn debug_outputs(input: &contracts::PointcloudInputConfig) -> Vec<(&'static str, &DebugOutputConfig)> {
    [
        ("pointcloud", input.reprojected_pointcloud.as_ref()),
        ("range_image", input.projected_range_image.as_ref()),
    ]
    .into_iter()
    .filter_map(|(kind, output)| output.map(|output| (kind, output)))
    .collect()
}

fn build_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) -> ConfigInfo {
    let inputs = blueprint
        .inputs
        .iter()
        .map(|input| InputInfo {
            topic_name: input.topic_name.clone(),
            topic_type: input.topic_type.to_string(),
            queue_length: input.topic_queue_length,
            retry_period_s: input.processing_retry_period,
            max_wait_for_pose_s: input.max_wait_for_pose,
            undistort_motion: input.undistort_motion,
            sensor_frame_id: input.sensor_frame_id.clone(),
            outputs: if args.outputs {
                debug_outputs(input)
                    .into_iter()
                    .map(|(kind, output)| OutputInfo {
                        kind,
                        name: output.name.clone(),
                        sink_type: format!("{:?}", output.sink_type),
                        params: output.params.clone(),
                    })
                    .collect()
            } else {
                Vec::new()
            },
        })
        .collect();

    let integrators = blueprint
        .integrators
        .iter()
        .map(|integrator| IntegratorInfo {
            name: integrator.name.clone(),
            integrator_type: format!("{:?}", integrator.integrator_type),
        })
        .collect();

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        world_frame: blueprint.world_frame.clone(),
        inputs,
        integrators,
        simulation: args.simulation.then(|| blueprint.simulation.clone()),
    }
}

fn print_config_info(blueprint: &PipelineBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              Pointcloud Ingest Configuration                 ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📍 World");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   └─ Frame: {}", blueprint.world_frame);

    println!("\n📡 Inputs ({})", blueprint.inputs.len());
    for (i, input) in blueprint.inputs.iter().enumerate() {
        let is_last = i == blueprint.inputs.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {} ({})", prefix, input.topic_name, input.topic_type);
        println!(
            "   {}  ├─ queue {} / retry {}s / max wait {}s",
            child_prefix,
            input.topic_queue_length,
            input.processing_retry_period,
            input.max_wait_for_pose
        );
        if let Some(ref frame) = input.sensor_frame_id {
            println!("   {}  ├─ Sensor frame: {}", child_prefix, frame);
        }

        let outputs = debug_outputs(input);
        if args.outputs && !outputs.is_empty() {
            println!("   {}  ├─ Undistort: {}", child_prefix, input.undistort_motion);
            println!("   {}  └─ Debug outputs ({}):", child_prefix, outputs.len());
            for (j, (kind, output)) in outputs.iter().enumerate() {
                let output_prefix = if j == outputs.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {}     {} {} -> {} ({:?})",
                    child_prefix, output_prefix, kind, output.name, output.sink_type
                );
            }
        } else {
            println!("   {}  └─ Undistort: {}", child_prefix, input.undistort_motion);
        }
    }

    println!("\n🧩 Integrators ({})", blueprint.integrators.len());
    if blueprint.integrators.is_empty() {
        println!("   └─ (log integrator)");
    }
    for (i, integrator) in blueprint.integrators.iter().enumerate() {
        let prefix = if i == blueprint.integrators.len() - 1 { "└─" } else { "├─" };
        println!("   {} {} ({:?})", prefix, integrator.name, integrator.integrator_type);
    }

    if args.simulation {
        let sim = &blueprint.simulation;
        println!("\n⚙️  Simulation");
        println!(
            "   ├─ Clouds: {} Hz, {} points, {} ms scans",
            sim.cloud_rate_hz, sim.points_per_cloud, sim.scan_duration_ms
        );
        println!(
            "   ├─ Poses: {} Hz, {} ms latency, {} s history",
            sim.pose_rate_hz, sim.pose_latency_ms, sim.pose_history_s
        );
        println!(
            "   └─ Trajectory: r = {} m, ω = {} rad/s",
            sim.trajectory_radius_m, sim.angular_velocity_rad_s
        );
    }

    println!();
}
