//! Debug publisher - republishes integrated clouds and range images
//!
//! Every channel is checked for listeners before anything is copied; no
//! listener or no data is a silent no-op.

use contracts::{DebugMessage, DebugOutputConfig, DebugSinkType, PosedPointcloud, PosedRangeImage};
use tracing::{debug, instrument, trace};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::sinks::{FileSink, LogSink, NetworkSink};

/// Create a SinkHandle from configuration
#[instrument(
    name = "debug_publisher_create_sink",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn create_sink_handle(config: &DebugOutputConfig) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        DebugSinkType::Log => {
            let sink = LogSink::new(&config.name);
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        DebugSinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
        DebugSinkType::Network => {
            let sink = NetworkSink::from_params(&config.name, &config.params)
                .await
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, config.queue_capacity))
        }
    }
}

/// Optional republishing of reprojected clouds and projected range images
#[derive(Default)]
pub struct DebugPublisher {
    pointcloud: Option<SinkHandle>,
    range_image: Option<SinkHandle>,
}

impl DebugPublisher {
    /// Publisher without any output
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn with_handles(pointcloud: Option<SinkHandle>, range_image: Option<SinkHandle>) -> Self {
        Self {
            pointcloud,
            range_image,
        }
    }

    /// Build the configured outputs
    pub async fn from_config(
        reprojected_pointcloud: Option<&DebugOutputConfig>,
        projected_range_image: Option<&DebugOutputConfig>,
    ) -> Result<Self, DispatcherError> {
        let pointcloud = match reprojected_pointcloud {
            Some(config) => Some(create_sink_handle(config).await?),
            None => None,
        };
        let range_image = match projected_range_image {
            Some(config) => Some(create_sink_handle(config).await?),
            None => None,
        };
        Ok(Self {
            pointcloud,
            range_image,
        })
    }

    /// Someone listens for reprojected clouds
    pub fn wants_pointcloud(&self) -> bool {
        self.pointcloud.as_ref().is_some_and(SinkHandle::has_subscribers)
    }

    /// Someone listens for range images
    pub fn wants_range_image(&self) -> bool {
        self.range_image.as_ref().is_some_and(SinkHandle::has_subscribers)
    }

    pub fn publish_pointcloud(&self, stamp_ns: u64, pointcloud: &PosedPointcloud) {
        let Some(handle) = self.pointcloud.as_ref().filter(|h| h.has_subscribers()) else {
            return;
        };
        trace!(sink = %handle.name(), stamp_ns, "publishing reprojected pointcloud");
        handle.publish(DebugMessage::Pointcloud {
            stamp_ns,
            pointcloud: pointcloud.clone(),
        });
    }

    pub fn publish_range_image(&self, stamp_ns: u64, range_image: &PosedRangeImage) {
        let Some(handle) = self.range_image.as_ref().filter(|h| h.has_subscribers()) else {
            return;
        };
        trace!(sink = %handle.name(), stamp_ns, "publishing projected range image");
        handle.publish(DebugMessage::RangeImage {
            stamp_ns,
            range_image: range_image.clone(),
        });
    }

    /// Sink handles, for metrics reporting
    pub fn handles(&self) -> impl Iterator<Item = &SinkHandle> {
        self.pointcloud.iter().chain(self.range_image.iter())
    }

    /// Drain and stop the sink workers
    pub async fn shutdown(self) {
        for handle in self.pointcloud.into_iter().chain(self.range_image) {
            handle.shutdown().await;
        }
        debug!("debug publisher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Transformation3D;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_disabled_publisher_is_noop() {
        let publisher = DebugPublisher::disabled();
        assert!(!publisher.wants_pointcloud());
        assert!(!publisher.wants_range_image());
        publisher.publish_pointcloud(1, &PosedPointcloud::new(Transformation3D::identity(), vec![]));
        publisher.shutdown().await;
    }

    #[tokio::test]
    async fn test_log_output_always_listens() {
        let publisher = DebugPublisher::from_config(Some(&DebugOutputConfig::log("cloud")), None)
            .await
            .unwrap();
        assert!(publisher.wants_pointcloud());
        assert!(!publisher.wants_range_image());

        publisher.publish_pointcloud(5, &PosedPointcloud::new(Transformation3D::identity(), vec![]));
        let handle = publisher.handles().next().unwrap();
        let metrics = handle.metrics().clone();
        publisher.shutdown().await;
        assert_eq!(metrics.write_count(), 1);
    }

    #[tokio::test]
    async fn test_network_output_without_listener_skips_work() {
        let config = DebugOutputConfig {
            name: "range".into(),
            sink_type: DebugSinkType::Network,
            queue_capacity: 4,
            params: HashMap::from([("addr".to_string(), "127.0.0.1:0".to_string())]),
        };
        let publisher = DebugPublisher::from_config(None, Some(&config)).await.unwrap();
        assert!(!publisher.wants_range_image());

        publisher.publish_range_image(
            1,
            &PosedRangeImage::new(Transformation3D::identity(), 4, 2, -0.1, 0.1),
        );
        let metrics = publisher.handles().next().unwrap().metrics().clone();
        publisher.shutdown().await;
        assert_eq!(metrics.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_network_addr_fails_construction() {
        let config = DebugOutputConfig {
            name: "net".into(),
            sink_type: DebugSinkType::Network,
            queue_capacity: 4,
            params: HashMap::new(),
        };
        assert!(matches!(
            DebugPublisher::from_config(Some(&config), None).await,
            Err(DispatcherError::SinkCreation { .. })
        ));
    }
}
