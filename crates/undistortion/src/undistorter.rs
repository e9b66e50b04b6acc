//! Motion undistortion.
//!
//! A cloud captured over `[start, end]` is resolved against the pose source at
//! both boundaries and at `num_interpolation_steps + 1` evenly spaced samples.
//! Each point is moved by its own interpolated pose and re-expressed in the
//! sensor frame at the cloud's median time, whose pose becomes the single pose
//! of the output cloud.

use contracts::{GenericStampedPointcloud, PoseLookupError, PosedPointcloud, Transformation3D};
use thiserror::Error;
use tracing::{instrument, trace};

use crate::interpolation::interpolate_pose;
use crate::resolver::PoseResolver;

/// Pose samples taken across one capture interval
pub const DEFAULT_INTERPOLATION_STEPS: u32 = 100;

/// Why a cloud could not be undistorted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum UndistortionError {
    /// Start pose missing although the end pose resolved (history evicted)
    #[error("start pose at {stamp_ns}ns not in transform buffer: {source}")]
    StartTimeNotInBuffer {
        stamp_ns: u64,
        #[source]
        source: PoseLookupError,
    },

    /// End pose not resolvable (usually not arrived yet)
    #[error("end pose at {stamp_ns}ns not in transform buffer: {source}")]
    EndTimeNotInBuffer {
        stamp_ns: u64,
        #[source]
        source: PoseLookupError,
    },

    /// Interior sample missing although both boundaries resolved
    #[error("intermediate pose at {stamp_ns}ns not in transform buffer: {source}")]
    IntermediateTimeNotInBuffer {
        stamp_ns: u64,
        #[source]
        source: PoseLookupError,
    },
}

impl UndistortionError {
    /// Failed lookup behind this outcome
    pub fn lookup_error(&self) -> &PoseLookupError {
        match self {
            Self::StartTimeNotInBuffer { source, .. }
            | Self::EndTimeNotInBuffer { source, .. }
            | Self::IntermediateTimeNotInBuffer { source, .. } => source,
        }
    }

    /// Only a missing end pose that lies in the future is worth waiting for
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EndTimeNotInBuffer { source, .. } if source.is_retryable())
    }
}

/// Pose samples covering a capture interval
struct PoseSamples {
    start_ns: u64,
    duration_ns: u64,
    steps: u32,
    poses: Vec<Transformation3D>,
}

impl PoseSamples {
    fn sample_time(start_ns: u64, duration_ns: u64, steps: u32, idx: u32) -> u64 {
        start_ns + (u128::from(duration_ns) * u128::from(idx) / u128::from(steps)) as u64
    }

    fn time(&self, idx: u32) -> u64 {
        Self::sample_time(self.start_ns, self.duration_ns, self.steps, idx)
    }

    /// Pose at `start_ns + offset_ns`, interpolated between bracketing samples
    fn pose_at(&self, offset_ns: u64) -> Transformation3D {
        let offset_ns = offset_ns.min(self.duration_ns);
        let idx = (u128::from(offset_ns) * u128::from(self.steps) / u128::from(self.duration_ns))
            .min(u128::from(self.steps - 1)) as u32;
        let (t0, t1) = (self.time(idx), self.time(idx + 1));
        let stamp = self.start_ns + offset_ns;
        let frac = if t1 > t0 {
            (stamp - t0) as f64 / (t1 - t0) as f64
        } else {
            0.0
        };
        interpolate_pose(
            &self.poses[idx as usize],
            &self.poses[idx as usize + 1],
            frac as f32,
        )
    }
}

/// Motion undistortion engine
#[derive(Debug, Clone)]
pub struct PointcloudUndistorter {
    resolver: PoseResolver,
    num_interpolation_steps: u32,
}

impl PointcloudUndistorter {
    pub fn new(resolver: PoseResolver) -> Self {
        Self::with_interpolation_steps(resolver, DEFAULT_INTERPOLATION_STEPS)
    }

    pub fn with_interpolation_steps(resolver: PoseResolver, steps: u32) -> Self {
        Self {
            resolver,
            num_interpolation_steps: steps.max(1),
        }
    }

    pub fn resolver(&self) -> &PoseResolver {
        &self.resolver
    }

    /// Produce a single-pose, motion-compensated cloud
    ///
    /// The end pose is checked first: if it is missing the cloud may simply be
    /// ahead of the pose source. A missing start pose after that means the
    /// history no longer reaches back far enough.
    #[instrument(
        level = "trace",
        name = "undistort_pointcloud",
        skip(self, cloud),
        fields(frame = %cloud.sensor_frame(), start = cloud.start_time(), end = cloud.end_time())
    )]
    pub fn undistort(
        &self,
        cloud: &GenericStampedPointcloud,
    ) -> Result<PosedPointcloud, UndistortionError> {
        let frame = cloud.sensor_frame().as_str();
        let start_ns = cloud.start_time();
        let end_ns = cloud.end_time();

        let end_pose = self.resolver.lookup(frame, end_ns).map_err(|source| {
            UndistortionError::EndTimeNotInBuffer {
                stamp_ns: end_ns,
                source,
            }
        })?;
        let start_pose = self.resolver.lookup(frame, start_ns).map_err(|source| {
            UndistortionError::StartTimeNotInBuffer {
                stamp_ns: start_ns,
                source,
            }
        })?;

        let duration_ns = end_ns - start_ns;
        if duration_ns == 0 {
            return Ok(PosedPointcloud::from_stamped(start_pose, cloud));
        }

        let samples = self.sample_poses(frame, start_ns, duration_ns, start_pose, end_pose)?;

        let median_pose = samples.pose_at(cloud.median_time() - start_ns);
        let median_inverse = median_pose.inverse();
        let points = cloud
            .points()
            .iter()
            .map(|point| {
                let point_pose = samples.pose_at(u64::from(point.time_offset));
                median_inverse * (point_pose * point.position)
            })
            .collect();

        trace!(points = cloud.len(), duration_ns, "pointcloud undistorted");
        Ok(PosedPointcloud::new(median_pose, points))
    }

    fn sample_poses(
        &self,
        frame: &str,
        start_ns: u64,
        duration_ns: u64,
        start_pose: Transformation3D,
        end_pose: Transformation3D,
    ) -> Result<PoseSamples, UndistortionError> {
        let steps = self.num_interpolation_steps;
        let mut poses = Vec::with_capacity(steps as usize + 1);
        poses.push(start_pose);
        for idx in 1..steps {
            let stamp_ns = PoseSamples::sample_time(start_ns, duration_ns, steps, idx);
            let pose = self.resolver.lookup(frame, stamp_ns).map_err(|source| {
                UndistortionError::IntermediateTimeNotInBuffer { stamp_ns, source }
            })?;
            poses.push(pose);
        }
        poses.push(end_pose);

        Ok(PoseSamples {
            start_ns,
            duration_ns,
            steps,
            poses,
        })
    }
}
