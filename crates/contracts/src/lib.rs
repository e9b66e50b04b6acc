//! # Contracts
//!
//! Frozen interface contracts shared by every pipeline crate: the point cloud
//! data model, raw transport messages, and the collaborator traits (pose
//! source, map integrator, debug sink, transport source).
//! Business crates depend on this crate only, never on each other's internals.
//!
//! ## Time Model
//! - Integer nanosecond stamps (`u64`) everywhere inside the pipeline
//! - Configuration durations are in seconds (`f64`)

mod blueprint;
mod config;
mod error;
mod frame_id;
mod integrator;
mod message;
mod pointcloud;
mod pose;
mod sink;
mod source;

pub use blueprint::*;
pub use config::*;
pub use error::*;
pub use frame_id::FrameId;
pub use integrator::MapIntegrator;
pub use message::*;
pub use pointcloud::*;
pub use pose::{PoseLookupError, PoseSource};
pub use sink::*;
pub use source::{PointcloudCallback, PointcloudSource};
