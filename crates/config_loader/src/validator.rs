//! 配置校验模块
//!
//! 校验规则：
//! - world_frame 非空
//! - 至少一个输入，topic_name 唯一
//! - 每个输入满足 `PointcloudInputConfig::check_valid`
//! - 调试输出的 sink 参数齐全
//! - 积分器名称非空且唯一，投影参数合法
//! - 仿真参数为正

use std::collections::HashSet;

use contracts::{
    ContractError, DebugOutputConfig, DebugSinkType, IntegratorType, PipelineBlueprint,
};

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_world_frame(blueprint)?;
    validate_inputs(blueprint)?;
    validate_debug_outputs(blueprint)?;
    validate_integrators(blueprint)?;
    validate_simulation(blueprint)?;
    validate_observability(blueprint)?;
    Ok(())
}

fn validate_world_frame(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.world_frame.trim().is_empty() {
        return Err(ContractError::config_validation(
            "world_frame",
            "world_frame cannot be empty",
        ));
    }
    Ok(())
}

/// 校验输入：非空、topic 唯一、字段取值
fn validate_inputs(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.inputs.is_empty() {
        return Err(ContractError::config_validation(
            "inputs",
            "at least one pointcloud input is required",
        ));
    }

    let mut seen = HashSet::new();
    for input in &blueprint.inputs {
        if !seen.insert(input.topic_name.as_str()) {
            return Err(ContractError::config_validation(
                format!("inputs[topic_name={}]", input.topic_name),
                "duplicate topic_name",
            ));
        }
        input.clone().check_valid()?;
    }
    Ok(())
}

/// 校验调试输出所需参数
fn validate_debug_outputs(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    for input in &blueprint.inputs {
        let outputs = [
            ("reprojected_pointcloud", input.reprojected_pointcloud.as_ref()),
            ("projected_range_image", input.projected_range_image.as_ref()),
        ];
        for (slot, output) in outputs {
            if let Some(output) = output {
                validate_debug_output(&format!("inputs[{}].{slot}", input.topic_name), output)?;
            }
        }
    }
    Ok(())
}

fn validate_debug_output(path: &str, output: &DebugOutputConfig) -> Result<(), ContractError> {
    let required = match output.sink_type {
        DebugSinkType::Log => None,
        DebugSinkType::File => Some("base_path"),
        DebugSinkType::Network => Some("addr"),
    };
    if let Some(param) = required {
        if !output.params.get(param).is_some_and(|v| !v.is_empty()) {
            return Err(ContractError::config_validation(
                format!("{path}.params.{param}"),
                format!("{:?} debug output '{}' requires '{param}'", output.sink_type, output.name),
            ));
        }
    }
    Ok(())
}

/// 校验积分器
fn validate_integrators(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, integrator) in blueprint.integrators.iter().enumerate() {
        if integrator.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("integrators[{idx}].name"),
                "integrator name cannot be empty",
            ));
        }
        if !seen.insert(integrator.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("integrators[name={}]", integrator.name),
                "duplicate integrator name",
            ));
        }

        if integrator.integrator_type == IntegratorType::RangeImage {
            let ri = &integrator.range_image;
            let path = format!("integrators[{}].range_image", integrator.name);
            if ri.width == 0 || ri.height == 0 {
                return Err(ContractError::config_validation(
                    path,
                    format!("image size must be > 0, got {}x{}", ri.width, ri.height),
                ));
            }
            if !(ri.min_elevation_deg < ri.max_elevation_deg) {
                return Err(ContractError::config_validation(
                    path,
                    format!(
                        "min_elevation_deg ({}) must be < max_elevation_deg ({})",
                        ri.min_elevation_deg, ri.max_elevation_deg
                    ),
                ));
            }
            if !(ri.max_range > 0.0) {
                return Err(ContractError::config_validation(
                    path,
                    format!("max_range must be > 0, got {}", ri.max_range),
                ));
            }
        }
    }
    Ok(())
}

/// 校验仿真参数
fn validate_simulation(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let sim = &blueprint.simulation;
    let positive = [
        ("cloud_rate_hz", sim.cloud_rate_hz),
        ("pose_rate_hz", sim.pose_rate_hz),
        ("pose_history_s", sim.pose_history_s),
    ];
    for (field, value) in positive {
        if !(value.is_finite() && value > 0.0) {
            return Err(ContractError::config_validation(
                format!("simulation.{field}"),
                format!("{field} must be > 0, got {value}"),
            ));
        }
    }

    let non_negative = [
        ("scan_duration_ms", sim.scan_duration_ms),
        ("pose_latency_ms", sim.pose_latency_ms),
        ("trajectory_radius_m", sim.trajectory_radius_m),
    ];
    for (field, value) in non_negative {
        if !(value.is_finite() && value >= 0.0) {
            return Err(ContractError::config_validation(
                format!("simulation.{field}"),
                format!("{field} must be >= 0, got {value}"),
            ));
        }
    }

    if sim.points_per_cloud == 0 {
        return Err(ContractError::config_validation(
            "simulation.points_per_cloud",
            "points_per_cloud must be > 0",
        ));
    }
    if !sim.angular_velocity_rad_s.is_finite() {
        return Err(ContractError::config_validation(
            "simulation.angular_velocity_rad_s",
            "angular_velocity_rad_s must be finite",
        ));
    }
    Ok(())
}

fn validate_observability(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if let Some(format) = &blueprint.observability.log_format {
        if !matches!(format.to_ascii_lowercase().as_str(), "json" | "pretty" | "compact") {
            return Err(ContractError::config_validation(
                "observability.log_format",
                format!("unknown log format '{format}', expected json, pretty or compact"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, IntegratorConfig, ObservabilitySettings, PointcloudFormat,
        PointcloudInputConfig, RangeImageConfig, SimulationConfig,
    };

    fn minimal_blueprint() -> PipelineBlueprint {
        PipelineBlueprint {
            version: ConfigVersion::V1,
            world_frame: "odom".into(),
            inputs: vec![PointcloudInputConfig::new(
                "/os_cloud_node/points",
                PointcloudFormat::PointCloud2,
            )],
            integrators: vec![IntegratorConfig {
                name: "log".into(),
                integrator_type: IntegratorType::Log,
                range_image: RangeImageConfig::default(),
            }],
            simulation: SimulationConfig::default(),
            observability: ObservabilitySettings::default(),
        }
    }

    fn field_of(err: ContractError) -> String {
        match err {
            ContractError::ConfigValidation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_blueprint() {
        assert!(validate(&minimal_blueprint()).is_ok());
    }

    #[test]
    fn test_empty_world_frame() {
        let mut bp = minimal_blueprint();
        bp.world_frame = "  ".into();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "world_frame");
    }

    #[test]
    fn test_no_inputs() {
        let mut bp = minimal_blueprint();
        bp.inputs.clear();
        assert_eq!(field_of(validate(&bp).unwrap_err()), "inputs");
    }

    #[test]
    fn test_duplicate_topic() {
        let mut bp = minimal_blueprint();
        bp.inputs.push(bp.inputs[0].clone());
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate topic_name"));
    }

    #[test]
    fn test_invalid_input_field_path() {
        let mut bp = minimal_blueprint();
        bp.inputs[0].processing_retry_period = 0.0;
        let field = field_of(validate(&bp).unwrap_err());
        assert_eq!(field, "inputs[/os_cloud_node/points].processing_retry_period");
    }

    #[test]
    fn test_network_output_requires_addr() {
        let mut bp = minimal_blueprint();
        let mut output = contracts::DebugOutputConfig::log("reprojected");
        output.sink_type = DebugSinkType::Network;
        bp.inputs[0].reprojected_pointcloud = Some(output.clone());
        let field = field_of(validate(&bp).unwrap_err());
        assert!(field.ends_with("reprojected_pointcloud.params.addr"));

        output.params.insert("addr".into(), "127.0.0.1:7000".into());
        bp.inputs[0].reprojected_pointcloud = Some(output);
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_integrator_name() {
        let mut bp = minimal_blueprint();
        bp.integrators.push(bp.integrators[0].clone());
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("duplicate integrator name"));
    }

    #[test]
    fn test_range_image_bounds() {
        let mut bp = minimal_blueprint();
        bp.integrators[0].integrator_type = IntegratorType::RangeImage;
        bp.integrators[0].range_image.min_elevation_deg = 10.0;
        bp.integrators[0].range_image.max_elevation_deg = -10.0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "integrators[log].range_image");
    }

    #[test]
    fn test_simulation_rates() {
        let mut bp = minimal_blueprint();
        bp.simulation.pose_rate_hz = 0.0;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "simulation.pose_rate_hz");

        let mut bp = minimal_blueprint();
        bp.simulation.pose_latency_ms = f64::NAN;
        assert_eq!(field_of(validate(&bp).unwrap_err()), "simulation.pose_latency_ms");
    }

    #[test]
    fn test_unknown_log_format() {
        let mut bp = minimal_blueprint();
        bp.observability.log_format = Some("xml".into());
        assert_eq!(field_of(validate(&bp).unwrap_err()), "observability.log_format");
    }
}
