//! PoseSource trait - transform buffer lookup contract
//!
//! The pose source is external (a transform buffer service); the pipeline only
//! needs a timed lookup and the newest stamp currently buffered.

use thiserror::Error;

use crate::Transformation3D;

/// Why a pose lookup failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoseLookupError {
    /// Stamp is newer than anything buffered, or the frame has no samples
    /// yet (`newest_ns == 0`); may resolve later
    #[error("pose for '{frame}' at {stamp_ns}ns not yet available (newest buffered: {newest_ns}ns)")]
    NotYetAvailable {
        frame: String,
        stamp_ns: u64,
        newest_ns: u64,
    },

    /// Stamp is older than the retained history; will never resolve
    #[error("pose for '{frame}' at {stamp_ns}ns no longer buffered (oldest buffered: {oldest_ns}ns)")]
    TooOld {
        frame: String,
        stamp_ns: u64,
        oldest_ns: u64,
    },

    /// Frame is buffered, but not relative to the requested world frame
    #[error("no transform from '{sensor_frame}' to '{world_frame}'")]
    UnknownFrame {
        world_frame: String,
        sensor_frame: String,
    },
}

impl PoseLookupError {
    /// Only poses from the future are worth waiting for
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotYetAvailable { .. })
    }
}

/// Timed pose lookup (sensor frame -> world frame)
pub trait PoseSource: Send + Sync {
    /// Pose of `sensor_frame` in `world_frame` at `stamp_ns`
    fn lookup_transform(
        &self,
        world_frame: &str,
        sensor_frame: &str,
        stamp_ns: u64,
    ) -> Result<Transformation3D, PoseLookupError>;

    /// Newest stamp buffered for `sensor_frame` relative to `world_frame`
    fn newest_timestamp(&self, world_frame: &str, sensor_frame: &str) -> Option<u64>;

    /// Cheap availability check, defaults to a full lookup
    fn can_transform(&self, world_frame: &str, sensor_frame: &str, stamp_ns: u64) -> bool {
        self.lookup_transform(world_frame, sensor_frame, stamp_ns)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_future_stamps_are_retryable() {
        let future = PoseLookupError::NotYetAvailable {
            frame: "lidar".into(),
            stamp_ns: 200,
            newest_ns: 150,
        };
        let evicted = PoseLookupError::TooOld {
            frame: "lidar".into(),
            stamp_ns: 10,
            oldest_ns: 50,
        };
        let unknown = PoseLookupError::UnknownFrame {
            world_frame: "odom".into(),
            sensor_frame: "lidar".into(),
        };
        assert!(future.is_retryable());
        assert!(!evicted.is_retryable());
        assert!(!unknown.is_retryable());
    }
}
