//! Reference map integrators
//!
//! Stand-ins for a volumetric map engine: enough to run the pipeline end to
//! end and to exercise the range-image debug output.

mod log;
mod range_image;

pub use self::log::LogIntegrator;
pub use self::range_image::RangeImageIntegrator;

use contracts::{IntegratorConfig, IntegratorType, MapIntegrator};

/// Build an integrator from configuration
pub fn create_integrator(config: &IntegratorConfig) -> Box<dyn MapIntegrator> {
    match config.integrator_type {
        IntegratorType::Log => Box::new(LogIntegrator::new(&config.name)),
        IntegratorType::RangeImage => {
            Box::new(RangeImageIntegrator::new(&config.name, config.range_image))
        }
    }
}
