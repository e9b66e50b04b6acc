//! # Undistortion
//!
//! Pose resolution and motion compensation for stamped point clouds.
//!
//! Responsibilities:
//! - Resolve the sensor pose in the world frame at one or more stamps
//! - Collapse a cloud captured over an interval into a single posed cloud
//! - Provide an in-memory, bounded transform buffer implementing `PoseSource`
//!
//! ## Usage Example
//!
//! ```ignore
//! use undistortion::{PointcloudUndistorter, PoseResolver, TransformBuffer};
//!
//! let buffer = Arc::new(TransformBuffer::new(1000));
//! let resolver = PoseResolver::new(buffer.clone(), "odom");
//! let undistorter = PointcloudUndistorter::new(resolver);
//!
//! match undistorter.undistort(&stamped_cloud) {
//!     Ok(posed) => integrate(posed),
//!     Err(e) if e.is_retryable() => { /* wait for more poses */ }
//!     Err(e) => warn!(error = %e, "dropping cloud"),
//! }
//! ```

mod interpolation;
mod resolver;
mod transform_buffer;
mod undistorter;

pub use contracts::{PoseLookupError, PoseSource, Transformation3D};
pub use interpolation::interpolate_pose;
pub use resolver::PoseResolver;
pub use transform_buffer::TransformBuffer;
pub use undistorter::{PointcloudUndistorter, UndistortionError, DEFAULT_INTERPOLATION_STEPS};
