//! PointcloudSource trait - sensor transport abstraction
//!
//! One source per sensor subscription. Sources deliver raw messages through a
//! callback from their own thread, so several sources produce concurrently.

use std::sync::Arc;

use crate::{PointcloudFormat, RawPointcloudMsg};

/// Raw message callback type
///
/// Shared across the source's delivery contexts, hence `Arc`.
pub type PointcloudCallback = Arc<dyn Fn(RawPointcloudMsg) + Send + Sync>;

/// Point cloud transport subscription
pub trait PointcloudSource: Send + Sync {
    /// Topic (channel) this source is subscribed to
    fn topic(&self) -> &str;

    /// Message format delivered by this source
    fn format(&self) -> PointcloudFormat;

    /// Register data callback
    ///
    /// Repeated calls while listening are idempotent.
    fn listen(&self, callback: PointcloudCallback);

    /// Stop delivering messages
    fn stop(&self);

    /// Check if currently listening
    fn is_listening(&self) -> bool;
}
