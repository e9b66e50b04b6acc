//! Simulated sensor trajectory
//!
//! Publishes the pose of every simulated sensor into the transform buffer at a
//! fixed rate. Each pose is published `pose_latency` after its stamp, so the
//! newest clouds always wait a little for their end pose, like they would
//! behind a real odometry source.

use std::sync::Arc;
use std::time::Duration;

use contracts::{SimulationConfig, Transformation3D};
use ingestion::MockClock;
use nalgebra::Vector3;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use undistortion::TransformBuffer;

/// Constant-speed circle in the world XY plane, heading along the tangent
#[derive(Debug, Clone, Copy)]
pub struct CircularTrajectory {
    radius: f64,
    angular_velocity: f64,
    origin_ns: u64,
}

impl CircularTrajectory {
    pub fn new(radius: f64, angular_velocity: f64, origin_ns: u64) -> Self {
        Self {
            radius,
            angular_velocity,
            origin_ns,
        }
    }

    pub fn from_simulation(sim: &SimulationConfig, origin_ns: u64) -> Self {
        Self::new(sim.trajectory_radius_m, sim.angular_velocity_rad_s, origin_ns)
    }

    /// Sensor pose at `stamp_ns`
    pub fn pose_at(&self, stamp_ns: u64) -> Transformation3D {
        let t = stamp_ns.saturating_sub(self.origin_ns) as f64 * 1e-9;
        let angle = self.angular_velocity * t;
        let position = Vector3::new(
            (self.radius * angle.cos()) as f32,
            (self.radius * angle.sin()) as f32,
            0.0,
        );
        let heading = angle + std::f64::consts::FRAC_PI_2;
        Transformation3D::new(position, Vector3::z() * heading as f32)
    }
}

/// Feeds simulated poses into a [`TransformBuffer`]
pub struct TrajectoryPublisher {
    buffer: Arc<TransformBuffer>,
    world_frame: String,
    sensor_frames: Vec<String>,
    trajectory: CircularTrajectory,
    clock: MockClock,
    period: Duration,
    latency_ns: u64,
}

impl TrajectoryPublisher {
    pub fn new(
        buffer: Arc<TransformBuffer>,
        world_frame: &str,
        sensor_frames: Vec<String>,
        trajectory: CircularTrajectory,
        clock: MockClock,
        sim: &SimulationConfig,
    ) -> Self {
        Self {
            buffer,
            world_frame: world_frame.to_string(),
            sensor_frames,
            trajectory,
            clock,
            period: Duration::from_secs_f64(1.0 / sim.pose_rate_hz),
            latency_ns: (sim.pose_latency_ms * 1e6) as u64,
        }
    }

    /// Publish the pose that has just become visible; returns its stamp
    pub fn publish_once(&self) -> u64 {
        let stamp_ns = self.clock.now_ns().saturating_sub(self.latency_ns);
        let pose = self.trajectory.pose_at(stamp_ns);
        for frame in &self.sensor_frames {
            self.buffer.insert(&self.world_frame, frame, stamp_ns, pose);
        }
        stamp_ns
    }

    /// Publish until `stop` flips to true; returns the number of ticks
    pub async fn run(self, mut stop: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut published = 0u64;

        info!(
            world_frame = %self.world_frame,
            sensor_frames = ?self.sensor_frames,
            period_ms = self.period.as_secs_f64() * 1e3,
            latency_ms = self.latency_ns as f64 / 1e6,
            "Trajectory publisher started"
        );

        loop {
            tokio::select! {
                _ = stop.wait_for(|stopped| *stopped) => break,
                _ = ticker.tick() => {
                    let stamp_ns = self.publish_once();
                    published += 1;
                    if published % 100 == 0 {
                        debug!(published, stamp_ns, "trajectory poses published");
                    }
                }
            }
        }

        info!(published, "Trajectory publisher stopped");
        published
    }
}
