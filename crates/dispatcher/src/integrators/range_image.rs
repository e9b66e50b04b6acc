//! RangeImageIntegrator - spherical projection of each cloud

use std::f32::consts::PI;

use contracts::{MapIntegrator, PosedPointcloud, PosedRangeImage, RangeImageConfig};
use tracing::trace;

/// Projects every integrated cloud into a range image and keeps the last one
#[derive(Debug)]
pub struct RangeImageIntegrator {
    name: String,
    config: RangeImageConfig,
    last: Option<PosedRangeImage>,
}

impl RangeImageIntegrator {
    pub fn new(name: impl Into<String>, config: RangeImageConfig) -> Self {
        Self {
            name: name.into(),
            config,
            last: None,
        }
    }

    /// Row/column of a sensor-frame point, `None` outside the field of view
    fn cell(&self, x: f32, y: f32, z: f32, range: f32) -> Option<(u32, u32)> {
        let min_elevation = self.config.min_elevation_deg.to_radians();
        let max_elevation = self.config.max_elevation_deg.to_radians();
        let elevation = (z / range).clamp(-1.0, 1.0).asin();
        if elevation < min_elevation || elevation > max_elevation {
            return None;
        }

        let azimuth = y.atan2(x);
        let width = self.config.width as f32;
        let height = self.config.height as f32;
        let col = (((azimuth + PI) / (2.0 * PI)) * width).floor().min(width - 1.0);
        let row = (((elevation - min_elevation) / (max_elevation - min_elevation)) * height)
            .floor()
            .min(height - 1.0);
        Some((row as u32, col as u32))
    }
}

impl MapIntegrator for RangeImageIntegrator {
    fn name(&self) -> &str {
        &self.name
    }

    fn integrate_pointcloud(&mut self, pointcloud: &PosedPointcloud) {
        let mut image = PosedRangeImage::new(
            *pointcloud.pose(),
            self.config.width,
            self.config.height,
            self.config.min_elevation_deg.to_radians(),
            self.config.max_elevation_deg.to_radians(),
        );

        let mut projected = 0usize;
        for p in pointcloud.points() {
            let range = p.coords.norm();
            if range <= f32::EPSILON || range > self.config.max_range {
                continue;
            }
            let Some((row, col)) = self.cell(p.x, p.y, p.z, range) else {
                continue;
            };
            if let Some(cell) = image.get_mut(row, col) {
                // nearest return wins
                if *cell == 0.0 || range < *cell {
                    *cell = range;
                }
                projected += 1;
            }
        }

        trace!(integrator = %self.name, points = pointcloud.len(), projected, "range image built");
        self.last = Some(image);
    }

    fn supports_range_image_export(&self) -> bool {
        true
    }

    fn last_posed_range_image(&self) -> Option<&PosedRangeImage> {
        self.last.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Point3D, Transformation3D};

    fn integrator() -> RangeImageIntegrator {
        RangeImageIntegrator::new(
            "range",
            RangeImageConfig {
                width: 360,
                height: 10,
                min_elevation_deg: -10.0,
                max_elevation_deg: 10.0,
                max_range: 50.0,
            },
        )
    }

    #[test]
    fn test_projects_nearest_return() {
        let mut integrator = integrator();
        assert!(integrator.supports_range_image_export());
        assert!(integrator.last_posed_range_image().is_none());

        let pose = Transformation3D::translation(1.0, 2.0, 0.0);
        integrator.integrate_pointcloud(&PosedPointcloud::new(
            pose,
            vec![
                Point3D::new(10.0, 0.0, 0.0),
                Point3D::new(5.0, 0.0, 0.0),
                Point3D::new(0.0, 0.0, 30.0),
                Point3D::new(80.0, 0.0, 0.0),
            ],
        ));

        let image = integrator.last_posed_range_image().unwrap();
        assert_eq!(image.pose, pose);
        // azimuth 0 -> column 180, elevation 0 -> row 5
        assert_eq!(image.get(5, 180), Some(5.0));
        assert_eq!(image.ranges.iter().filter(|r| **r > 0.0).count(), 1);
    }

    #[test]
    fn test_each_cloud_replaces_last_image() {
        let mut integrator = integrator();
        integrator.integrate_pointcloud(&PosedPointcloud::new(
            Transformation3D::identity(),
            vec![Point3D::new(0.0, 3.0, 0.0)],
        ));
        integrator.integrate_pointcloud(&PosedPointcloud::new(
            Transformation3D::identity(),
            vec![],
        ));
        assert_eq!(integrator.last_posed_range_image().unwrap().max_range(), 0.0);
    }
}
