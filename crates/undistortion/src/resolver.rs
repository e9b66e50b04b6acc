//! Pose resolver bound to one world frame.

use std::sync::Arc;

use contracts::{FrameId, PoseLookupError, PoseSource, Transformation3D};

/// Resolves sensor poses in a fixed world frame
#[derive(Clone)]
pub struct PoseResolver {
    source: Arc<dyn PoseSource>,
    world_frame: FrameId,
}

impl std::fmt::Debug for PoseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseResolver")
            .field("world_frame", &self.world_frame)
            .finish_non_exhaustive()
    }
}

impl PoseResolver {
    pub fn new(source: Arc<dyn PoseSource>, world_frame: impl Into<FrameId>) -> Self {
        Self {
            source,
            world_frame: world_frame.into(),
        }
    }

    pub fn world_frame(&self) -> &FrameId {
        &self.world_frame
    }

    /// Pose of `sensor_frame` in the world frame at `stamp_ns`
    pub fn lookup(
        &self,
        sensor_frame: &str,
        stamp_ns: u64,
    ) -> Result<Transformation3D, PoseLookupError> {
        self.source
            .lookup_transform(&self.world_frame, sensor_frame, stamp_ns)
    }

    /// Newest stamp the pose source holds for `sensor_frame`
    pub fn newest_timestamp(&self, sensor_frame: &str) -> Option<u64> {
        self.source.newest_timestamp(&self.world_frame, sensor_frame)
    }
}
