//! MapIntegrator trait - downstream map engine contract

use crate::{PosedPointcloud, PosedRangeImage};

/// Folds posed point clouds into a volumetric map
///
/// Called from the single dispatcher context, one cloud at a time, in
/// registration order.
pub trait MapIntegrator: Send {
    /// Integrator name (used for logging)
    fn name(&self) -> &str;

    /// Integrate one posed point cloud
    fn integrate_pointcloud(&mut self, pointcloud: &PosedPointcloud);

    /// Whether this integrator builds projective range images
    ///
    /// Queried once, when the integrator is registered.
    fn supports_range_image_export(&self) -> bool {
        false
    }

    /// Range image built by the last `integrate_pointcloud` call, if any
    fn last_posed_range_image(&self) -> Option<&PosedRangeImage> {
        None
    }
}
