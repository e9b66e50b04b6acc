//! LogIntegrator - counts and logs integrated clouds

use contracts::{MapIntegrator, PosedPointcloud};
use tracing::debug;

/// Integrator that only keeps counters
#[derive(Debug)]
pub struct LogIntegrator {
    name: String,
    clouds: u64,
    points: u64,
}

impl LogIntegrator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clouds: 0,
            points: 0,
        }
    }

    pub fn integrated_clouds(&self) -> u64 {
        self.clouds
    }

    pub fn integrated_points(&self) -> u64 {
        self.points
    }
}

impl MapIntegrator for LogIntegrator {
    fn name(&self) -> &str {
        &self.name
    }

    fn integrate_pointcloud(&mut self, pointcloud: &PosedPointcloud) {
        self.clouds += 1;
        self.points += pointcloud.len() as u64;
        let t = pointcloud.pose().translation.vector;
        debug!(
            integrator = %self.name,
            points = pointcloud.len(),
            x = t.x,
            y = t.y,
            z = t.z,
            total_clouds = self.clouds,
            "pointcloud integrated"
        );
    }
}
