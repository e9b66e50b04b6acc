//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{IntegratorType, PipelineBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    world_frame: String,
    input_count: usize,
    undistorted_inputs: usize,
    integrator_count: usize,
    debug_output_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(summarize(&blueprint)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(blueprint: &PipelineBlueprint) -> ConfigSummary {
    ConfigSummary {
        version: format!("{:?}", blueprint.version),
        world_frame: blueprint.world_frame.clone(),
        input_count: blueprint.inputs.len(),
        undistorted_inputs: blueprint
            .inputs
            .iter()
            .filter(|input| input.undistort_motion)
            .count(),
        integrator_count: blueprint.integrators.len(),
        debug_output_count: blueprint
            .inputs
            .iter()
            .map(|input| {
                usize::from(input.reprojected_pointcloud.is_some())
                    + usize::from(input.projected_range_image.is_some())
            })
            .sum(),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &PipelineBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.integrators.is_empty() {
        warnings.push("No integrators configured - clouds will only be logged".to_string());
    }

    let exports_range_images = blueprint
        .integrators
        .first()
        .is_some_and(|integrator| integrator.integrator_type == IntegratorType::RangeImage);

    let sim = &blueprint.simulation;
    for input in &blueprint.inputs {
        let topic = &input.topic_name;

        if input.undistort_motion && sim.scan_duration_ms <= 0.0 {
            warnings.push(format!(
                "Input '{topic}' undistorts motion but simulated scans have zero duration"
            ));
        }

        if input.max_wait_for_pose * 1e3 < sim.pose_latency_ms {
            warnings.push(format!(
                "Input '{topic}' waits {}s for poses, below the simulated pose latency of {}ms - most clouds will be dropped",
                input.max_wait_for_pose, sim.pose_latency_ms
            ));
        }

        if input.projected_range_image.is_some() && !exports_range_images {
            warnings.push(format!(
                "Input '{topic}' publishes range images but the first integrator does not produce them"
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  World frame: {}", summary.world_frame);
            println!(
                "  Inputs: {} ({} undistorted)",
                summary.input_count, summary.undistorted_inputs
            );
            println!("  Integrators: {}", summary.integrator_count);
            println!("  Debug outputs: {}", summary.debug_output_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
