//! Pipeline orchestration module.

mod orchestrator;
mod stats;
mod trajectory;

pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::{InputRunStats, PipelineStats};
