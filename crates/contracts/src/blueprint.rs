//! PipelineBlueprint - Config Loader output
//!
//! Describes a whole ingestion pipeline: world frame, point cloud inputs,
//! map integrators and the mock-sensor simulation used without real hardware.

use serde::{Deserialize, Serialize};

use crate::PointcloudInputConfig;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Fixed frame every cloud is posed in
    pub world_frame: String,

    /// Point cloud inputs
    pub inputs: Vec<PointcloudInputConfig>,

    /// Map integrators, in integration order
    #[serde(default)]
    pub integrators: Vec<IntegratorConfig>,

    /// Mock sensors and trajectory
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Logging and metrics export
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// Logging and metrics export settings
///
/// Command line flags take precedence over these.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// `json`, `pretty` or `compact`
    #[serde(default)]
    pub log_format: Option<String>,

    /// Prometheus exporter port, disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Integrator kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorType {
    /// Counts and logs clouds
    #[default]
    Log,
    /// Projects clouds into spherical range images
    RangeImage,
}

/// One map integrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegratorConfig {
    pub name: String,

    #[serde(default)]
    pub integrator_type: IntegratorType,

    /// Projection parameters, used by `range_image`
    #[serde(default)]
    pub range_image: RangeImageConfig,
}

/// Spherical projection parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeImageConfig {
    /// Azimuth bins
    pub width: u32,
    /// Elevation bins
    pub height: u32,
    /// Elevation field of view (degrees)
    pub min_elevation_deg: f32,
    pub max_elevation_deg: f32,
    /// Points further away are ignored (meters)
    pub max_range: f32,
}

impl Default for RangeImageConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 64,
            min_elevation_deg: -22.5,
            max_elevation_deg: 22.5,
            max_range: 100.0,
        }
    }
}

/// Mock sensors and simulated trajectory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Cloud publishing rate per input (Hz)
    pub cloud_rate_hz: f64,

    /// Points per simulated cloud
    pub points_per_cloud: u32,

    /// Capture duration of one cloud (milliseconds)
    pub scan_duration_ms: f64,

    /// Pose publishing rate (Hz)
    pub pose_rate_hz: f64,

    /// Delay before a pose becomes visible in the buffer (milliseconds)
    pub pose_latency_ms: f64,

    /// Pose history retained by the buffer (seconds)
    pub pose_history_s: f64,

    /// Radius of the circular trajectory (meters)
    pub trajectory_radius_m: f64,

    /// Angular velocity on the circle (rad/s)
    pub angular_velocity_rad_s: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cloud_rate_hz: 10.0,
            points_per_cloud: 2048,
            scan_duration_ms: 100.0,
            pose_rate_hz: 100.0,
            pose_latency_ms: 20.0,
            pose_history_s: 10.0,
            trajectory_radius_m: 5.0,
            angular_velocity_rad_s: 0.5,
        }
    }
}
