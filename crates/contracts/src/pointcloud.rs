//! Point cloud data model shared by ingestion, undistortion and integration.
//!
//! ## Time model
//! - All stamps are integer nanoseconds (`u64`).
//! - A [`GenericStampedPointcloud`] has one `timebase` plus a per-point offset
//!   (`u32` nanoseconds) relative to it.

use nalgebra::{Isometry3, Point3};
use serde::{Deserialize, Serialize};

use crate::FrameId;

/// Rigid transform, sensor frame -> world frame
pub type Transformation3D = Isometry3<f32>;

/// Point in 3D space (meters)
pub type Point3D = Point3<f32>;

/// A single measured point with its capture time offset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StampedPoint {
    /// Position in the sensor frame
    pub position: Point3D,

    /// Nanoseconds since the cloud's timebase
    pub time_offset: u32,
}

impl StampedPoint {
    pub fn new(x: f32, y: f32, z: f32, time_offset: u32) -> Self {
        Self {
            position: Point3D::new(x, y, z),
            time_offset,
        }
    }
}

/// Transport-independent point cloud captured over a time interval
///
/// Created by a producer, handed to the ingestion queue, consumed exactly once
/// by the integration dispatcher. Points keep message order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericStampedPointcloud {
    timebase: u64,
    sensor_frame: FrameId,
    points: Vec<StampedPoint>,
}

impl GenericStampedPointcloud {
    /// Create an empty cloud with room for `num_points`
    pub fn with_capacity(timebase: u64, sensor_frame: impl Into<FrameId>, num_points: usize) -> Self {
        Self {
            timebase,
            sensor_frame: sensor_frame.into(),
            points: Vec::with_capacity(num_points),
        }
    }

    /// Append a point
    #[inline]
    pub fn push(&mut self, x: f32, y: f32, z: f32, time_offset: u32) {
        self.points.push(StampedPoint::new(x, y, z, time_offset));
    }

    pub fn timebase(&self) -> u64 {
        self.timebase
    }

    pub fn sensor_frame(&self) -> &FrameId {
        &self.sensor_frame
    }

    pub fn points(&self) -> &[StampedPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Capture start, identical to the timebase
    pub fn start_time(&self) -> u64 {
        self.timebase
    }

    /// Timebase plus the largest point offset
    pub fn end_time(&self) -> u64 {
        self.timebase + u64::from(self.max_time_offset())
    }

    /// Timebase plus the lower median of the point offsets
    ///
    /// Always within `[start_time, end_time]`. Points are not reordered.
    pub fn median_time(&self) -> u64 {
        if self.points.is_empty() {
            return self.timebase;
        }
        let mut offsets: Vec<u32> = self.points.iter().map(|p| p.time_offset).collect();
        let mid = (offsets.len() - 1) / 2;
        let (_, median, _) = offsets.select_nth_unstable(mid);
        self.timebase + u64::from(*median)
    }

    /// Capture duration in nanoseconds
    pub fn duration_ns(&self) -> u64 {
        u64::from(self.max_time_offset())
    }

    fn max_time_offset(&self) -> u32 {
        self.points
            .iter()
            .map(|p| p.time_offset)
            .max()
            .unwrap_or(0)
    }
}

/// Point cloud bound to exactly one pose, ready for map integration
///
/// Points stay in the sensor frame; integrators apply `pose` themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosedPointcloud {
    pose: Transformation3D,
    points: Vec<Point3D>,
}

impl PosedPointcloud {
    pub fn new(pose: Transformation3D, points: Vec<Point3D>) -> Self {
        Self { pose, points }
    }

    /// Bind every point of a stamped cloud, unmodified, to a single pose
    pub fn from_stamped(pose: Transformation3D, stamped: &GenericStampedPointcloud) -> Self {
        let points = stamped.points().iter().map(|p| p.position).collect();
        Self { pose, points }
    }

    pub fn pose(&self) -> &Transformation3D {
        &self.pose
    }

    pub fn points(&self) -> &[Point3D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points transformed into the world frame
    pub fn world_points(&self) -> impl Iterator<Item = Point3D> + '_ {
        self.points.iter().map(move |p| self.pose * p)
    }
}

/// Spherical range image with the pose it was projected from
///
/// Row-major, `height` elevation rows by `width` azimuth columns. A range of
/// `0.0` marks an empty cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosedRangeImage {
    pub pose: Transformation3D,
    pub width: u32,
    pub height: u32,
    /// Lowest elevation angle covered (radians)
    pub min_elevation: f32,
    /// Highest elevation angle covered (radians)
    pub max_elevation: f32,
    pub ranges: Vec<f32>,
}

impl PosedRangeImage {
    /// Create an all-empty image
    pub fn new(
        pose: Transformation3D,
        width: u32,
        height: u32,
        min_elevation: f32,
        max_elevation: f32,
    ) -> Self {
        Self {
            pose,
            width,
            height,
            min_elevation,
            max_elevation,
            ranges: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn get(&self, row: u32, col: u32) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.ranges
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }

    pub fn get_mut(&mut self, row: u32, col: u32) -> Option<&mut f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.ranges
            .get_mut(row as usize * self.width as usize + col as usize)
    }

    /// Largest range stored in the image
    pub fn max_range(&self) -> f32 {
        self.ranges.iter().copied().fold(0.0, f32::max)
    }
}
