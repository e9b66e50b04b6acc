//! Point cloud input configuration
//!
//! Validated once at construction, immutable afterwards.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{ContractError, PointcloudFormat};

/// One point cloud input (one sensor subscription)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PointcloudInputConfig {
    /// Topic/channel to subscribe to
    #[validate(length(min = 1, message = "topic_name must not be empty"))]
    pub topic_name: String,

    /// Message format selector
    #[serde(default)]
    pub topic_type: PointcloudFormat,

    /// Subscription queue length, also the ingestion queue capacity hint
    #[validate(range(min = 1, message = "topic_queue_length must be > 0"))]
    #[serde(default = "default_topic_queue_length")]
    pub topic_queue_length: usize,

    /// Period of the queue processing timer (seconds)
    #[validate(range(exclusive_min = 0.0, message = "processing_retry_period must be > 0"))]
    #[serde(default = "default_processing_retry_period")]
    pub processing_retry_period: f64,

    /// How long to wait for a pose before giving up on a cloud (seconds)
    #[validate(range(min = 0.0, message = "max_wait_for_pose must be >= 0"))]
    #[serde(default = "default_max_wait_for_pose")]
    pub max_wait_for_pose: f64,

    /// Overrides the frame id embedded in messages
    #[serde(default)]
    pub sensor_frame_id: Option<String>,

    /// Added to every message stamp (seconds, may be negative)
    #[serde(default)]
    pub time_offset: f64,

    /// Compensate sensor motion during capture
    #[serde(default)]
    pub undistort_motion: bool,

    /// Republish integrated clouds
    #[validate(nested)]
    #[serde(default)]
    pub reprojected_pointcloud: Option<DebugOutputConfig>,

    /// Republish range images from the first integrator
    #[validate(nested)]
    #[serde(default)]
    pub projected_range_image: Option<DebugOutputConfig>,
}

fn default_topic_queue_length() -> usize {
    10
}

fn default_processing_retry_period() -> f64 {
    0.05
}

fn default_max_wait_for_pose() -> f64 {
    1.0
}

impl PointcloudInputConfig {
    /// Minimal config for a topic, everything else defaulted
    pub fn new(topic_name: impl Into<String>, topic_type: PointcloudFormat) -> Self {
        Self {
            topic_name: topic_name.into(),
            topic_type,
            topic_queue_length: default_topic_queue_length(),
            processing_retry_period: default_processing_retry_period(),
            max_wait_for_pose: default_max_wait_for_pose(),
            sensor_frame_id: None,
            time_offset: 0.0,
            undistort_motion: false,
            reprojected_pointcloud: None,
            projected_range_image: None,
        }
    }

    /// Validate and hand the config back, or report the first offending field
    pub fn check_valid(self) -> Result<Self, ContractError> {
        for (field, value) in [
            ("processing_retry_period", self.processing_retry_period),
            ("max_wait_for_pose", self.max_wait_for_pose),
            ("time_offset", self.time_offset),
        ] {
            if !value.is_finite() {
                return Err(ContractError::config_validation(
                    format!("inputs[{}].{field}", self.topic_name),
                    format!("{field} must be finite, got {value}"),
                ));
            }
        }

        self.validate().map_err(|errors| {
            let field = errors
                .field_errors()
                .keys()
                .next()
                .map(|k| k.to_string())
                .unwrap_or_else(|| "input".to_string());
            ContractError::config_validation(
                format!("inputs[{}].{field}", self.topic_name),
                errors.to_string(),
            )
        })?;
        Ok(self)
    }

    /// Timer period for the processing loop
    pub fn retry_period(&self) -> Duration {
        Duration::from_secs_f64(self.processing_retry_period)
    }

    /// Pose wait budget
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs_f64(self.max_wait_for_pose)
    }

    /// Pose wait budget in nanoseconds
    pub fn max_wait_ns(&self) -> u64 {
        (self.max_wait_for_pose * 1e9) as u64
    }

    /// Stamp offset in nanoseconds
    pub fn time_offset_ns(&self) -> i64 {
        (self.time_offset * 1e9).round() as i64
    }
}

/// Debug output type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugSinkType {
    /// Summaries through tracing
    #[default]
    Log,
    /// PLY / PNG files on disk
    File,
    /// TCP stream to connected subscribers
    Network,
}

/// Debug output channel
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DebugOutputConfig {
    /// Channel identifier
    #[validate(length(min = 1, message = "debug output name must not be empty"))]
    pub name: String,

    #[serde(default)]
    pub sink_type: DebugSinkType,

    /// Worker queue capacity
    #[validate(range(min = 1))]
    #[serde(default = "default_debug_queue_capacity")]
    pub queue_capacity: usize,

    /// Sink-specific parameters (`base_path`, `addr`, `format`, ...)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_debug_queue_capacity() -> usize {
    16
}

impl DebugOutputConfig {
    pub fn log(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sink_type: DebugSinkType::Log,
            queue_capacity: default_debug_queue_capacity(),
            params: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PointcloudInputConfig::new("/os_cloud_node/points", PointcloudFormat::PointCloud2);
        assert!(config.check_valid().is_ok());
    }

    #[test]
    fn test_rejects_empty_topic() {
        let config = PointcloudInputConfig::new("", PointcloudFormat::Livox);
        let err = config.check_valid().unwrap_err();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }

    #[test]
    fn test_rejects_negative_wait_and_zero_period() {
        let mut config = PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2);
        config.max_wait_for_pose = -0.1;
        assert!(config.clone().check_valid().is_err());

        config.max_wait_for_pose = 0.0;
        config.processing_retry_period = 0.0;
        assert!(config.clone().check_valid().is_err());

        config.processing_retry_period = 0.1;
        assert!(config.check_valid().is_ok());
    }

    #[test]
    fn test_rejects_zero_queue_length_and_nan() {
        let mut config = PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2);
        config.topic_queue_length = 0;
        assert!(config.clone().check_valid().is_err());

        config.topic_queue_length = 5;
        config.time_offset = f64::NAN;
        assert!(config.check_valid().is_err());
    }

    #[test]
    fn test_rejects_unnamed_debug_output() {
        let mut config = PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2);
        config.reprojected_pointcloud = Some(DebugOutputConfig::log(""));
        assert!(config.check_valid().is_err());
    }

    #[test]
    fn test_unit_conversions() {
        let mut config = PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2);
        config.time_offset = -0.25;
        config.max_wait_for_pose = 0.5;
        assert_eq!(config.time_offset_ns(), -250_000_000);
        assert_eq!(config.max_wait_ns(), 500_000_000);
        assert_eq!(config.max_wait(), Duration::from_millis(500));
    }
}
