//! # Ingestion Pipeline
//!
//! Point cloud ingestion (producer side).
//!
//! Responsibilities:
//! - Register point cloud inputs and their transport sources (Mock and Real)
//! - Normalize raw messages into `GenericStampedPointcloud`
//! - Reject empty or malformed messages with a logged reason
//! - Hand clouds to the single consumer through a per-input MPSC queue
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, MockPointcloudSource};
//!
//! let mut pipeline = IngestionPipeline::new();
//! let consumer = pipeline.register_input(input_config)?;
//! pipeline.register_source(Box::new(MockPointcloudSource::livox(
//!     "livox/lidar", "livox_frame", 10.0, 2048,
//! )))?;
//!
//! pipeline.start_all();
//! // hand `consumer` to the integration dispatcher
//! ```

mod adapter;
mod adapters;
mod error;
mod generic_adapter;
mod ingestor;
mod metrics;
mod mock;
mod pipeline;
mod queue;

// Re-exports
pub use adapter::{adapter_for, RawMessageAdapter};
pub use adapters::{structured_msg_from_points, StructuredAdapter, TimedAdapter, XyzPoint};
pub use error::{IngestionError, Result};
pub use generic_adapter::SourceSubscription;
pub use ingestor::PointcloudIngestor;
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use mock::{MockClock, MockPointcloudConfig, MockPointcloudSource};
pub use pipeline::IngestionPipeline;
pub use queue::{PointcloudQueue, QueueConsumer, QueueProducer};
