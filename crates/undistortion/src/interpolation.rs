//! Pose interpolation.

use contracts::Transformation3D;
use nalgebra::Translation3;

/// Interpolate between two poses, `t` in `[0, 1]`
///
/// Translation is linear, rotation is spherical along the shortest arc.
pub fn interpolate_pose(a: &Transformation3D, b: &Transformation3D, t: f32) -> Transformation3D {
    let t = t.clamp(0.0, 1.0);
    let translation = a.translation.vector.lerp(&b.translation.vector, t);
    // slerp is undefined for opposite rotations; fall back to nlerp there
    let rotation = a
        .rotation
        .try_slerp(&b.rotation, t, 1.0e-6)
        .unwrap_or_else(|| a.rotation.nlerp(&b.rotation, t));
    Transformation3D::from_parts(Translation3::from(translation), rotation)
}
