//! LogSink - logs debug message summaries via tracing

use chrono::{DateTime, SecondsFormat, Utc};
use contracts::{ContractError, DebugMessage, DebugSink, SubscriberGauge};
use tracing::{info, instrument};

/// Sink that logs what would have been republished
///
/// The log itself counts as a permanent listener.
pub struct LogSink {
    name: String,
    subscribers: SubscriberGauge,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: SubscriberGauge::new(1),
        }
    }

    fn log_summary(&self, message: &DebugMessage) {
        let stamp = DateTime::<Utc>::from_timestamp_nanos(message.stamp_ns() as i64)
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        match message {
            DebugMessage::Pointcloud { pointcloud, .. } => {
                let translation = pointcloud.pose().translation.vector;
                info!(
                    sink = %self.name,
                    stamp = %stamp,
                    points = pointcloud.len(),
                    x = translation.x,
                    y = translation.y,
                    z = translation.z,
                    "Reprojected pointcloud"
                );
            }
            DebugMessage::RangeImage { range_image, .. } => {
                let filled = range_image.ranges.iter().filter(|r| **r > 0.0).count();
                info!(
                    sink = %self.name,
                    stamp = %stamp,
                    width = range_image.width,
                    height = range_image.height,
                    filled,
                    max_range = range_image.max_range(),
                    "Projected range image"
                );
            }
        }
    }
}

impl DebugSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribers(&self) -> SubscriberGauge {
        self.subscribers.clone()
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, message),
        fields(sink = %self.name, kind = message.kind())
    )]
    async fn write(&mut self, message: &DebugMessage) -> Result<(), ContractError> {
        self.log_summary(message);
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PosedRangeImage, Transformation3D};

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let message = DebugMessage::RangeImage {
            stamp_ns: 1_700_000_000_000_000_000,
            range_image: PosedRangeImage::new(Transformation3D::identity(), 8, 4, -0.3, 0.3),
        };
        assert!(sink.write(&message).await.is_ok());
        assert!(sink.subscribers().has_subscribers());
        assert_eq!(sink.name(), "test_log");
    }
}
