//! # Dispatcher
//!
//! 积分调度模块。
//!
//! 负责：
//! - 按到达顺序消费 ingestion 队列中的点云
//! - 解析位姿（直接查询或运动去畸变），等待或丢弃
//! - 依注册顺序送入各个 `MapIntegrator`
//! - 可选地发布重投影点云与距离图像（调试输出，慢 sink 不阻塞主链路）

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod integrators;
pub mod metrics;
pub mod publisher;
pub mod sinks;

pub use contracts::{DebugMessage, DebugSink, MapIntegrator};
pub use dispatcher::{DispatcherConfig, DrainReport, IntegrationDispatcher};
pub use error::DispatcherError;
pub use handle::{PublishOutcome, SinkHandle};
pub use integrators::{create_integrator, LogIntegrator, RangeImageIntegrator};
pub use metrics::{DispatcherStats, DropReason, IntegrationTimer, MetricsSnapshot, SinkMetrics};
pub use publisher::{create_sink_handle, DebugPublisher};
pub use sinks::{FileSink, FileSinkConfig, LogSink, NetworkFormat, NetworkSink, NetworkSinkConfig};
