//! 各消息格式的适配器实现

pub(crate) mod common;
mod structured;
mod timed;

pub use common::{structured_msg_from_points, XyzPoint};
pub use structured::StructuredAdapter;
pub use timed::TimedAdapter;
