//! 点云入队
//!
//! 每个输入 (topic) 一个 `PointcloudIngestor`，在传输层回调线程中同步执行，
//! 不阻塞：拒收时记录 warn 并返回，成功时恰好入队一帧。

use std::sync::Arc;

use contracts::{FrameId, GenericStampedPointcloud, PointcloudInputConfig, RawPointcloudMsg};
use tracing::{trace, warn};

use crate::adapter::{adapter_for, RawMessageAdapter};
use crate::error::{IngestionError, Result};
use crate::metrics::IngestionMetrics;
use crate::queue::QueueProducer;

/// 单个输入的消息归一化与入队
pub struct PointcloudIngestor {
    topic: Arc<str>,
    sensor_frame_override: Option<String>,
    time_offset_ns: i64,
    adapter: Box<dyn RawMessageAdapter>,
    producer: QueueProducer,
    metrics: Arc<IngestionMetrics>,
}

impl PointcloudIngestor {
    /// 根据已校验的配置创建
    pub fn new(
        config: &PointcloudInputConfig,
        producer: QueueProducer,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            topic: Arc::from(config.topic_name.as_str()),
            sensor_frame_override: config
                .sensor_frame_id
                .clone()
                .filter(|frame| !frame.is_empty()),
            time_offset_ns: config.time_offset_ns(),
            adapter: adapter_for(config.topic_type),
            producer,
            metrics,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 处理一条原始消息，返回是否入队
    ///
    /// 拒收不是错误：记录日志和指标后丢弃。
    pub fn on_message(&self, msg: RawPointcloudMsg) -> bool {
        self.metrics.record_received();
        observability::record_pointcloud_received(&self.topic, msg.format());
        match self.ingest(&msg) {
            Ok(num_points) => {
                self.metrics.record_enqueued(num_points);
                observability::record_pointcloud_enqueued(&self.topic, num_points);
                trace!(topic = %self.topic, num_points, "pointcloud enqueued");
                true
            }
            Err(e) => {
                self.metrics.record_rejected();
                observability::record_pointcloud_rejected(&self.topic, e.reason());
                warn!(
                    topic = %self.topic,
                    stamp_ns = msg.header().stamp_ns,
                    reason = e.reason(),
                    error = %e,
                    "skipping pointcloud"
                );
                false
            }
        }
    }

    /// 归一化并入队，返回点数
    pub fn ingest(&self, msg: &RawPointcloudMsg) -> Result<usize> {
        let cloud = self.normalize(msg)?;
        let num_points = cloud.len();
        self.producer.push(cloud)?;
        Ok(num_points)
    }

    /// 转换为 `GenericStampedPointcloud`，不入队
    pub fn normalize(&self, msg: &RawPointcloudMsg) -> Result<GenericStampedPointcloud> {
        let adapter = self.adapter.as_ref();
        if msg.format() != adapter.format() {
            return Err(IngestionError::FormatMismatch {
                expected: adapter.format(),
                actual: msg.format(),
            });
        }

        let num_points = adapter.num_points(msg)?;
        if num_points == 0 {
            return Err(IngestionError::EmptyPointcloud);
        }

        let timebase = adapter
            .extract_timebase(msg)?
            .saturating_add_signed(self.time_offset_ns);
        let frame = FrameId::resolve(
            self.sensor_frame_override.as_deref(),
            adapter.extract_frame(msg),
        );

        let mut cloud = GenericStampedPointcloud::with_capacity(timebase, frame, num_points);
        adapter.extract_points(msg, &mut cloud)?;
        Ok(cloud)
    }
}

impl std::fmt::Debug for PointcloudIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointcloudIngestor")
            .field("topic", &self.topic)
            .field("format", &self.adapter.format())
            .field("sensor_frame_override", &self.sensor_frame_override)
            .field("time_offset_ns", &self.time_offset_ns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{structured_msg_from_points, XyzPoint};
    use crate::queue::PointcloudQueue;
    use contracts::{MessageHeader, PointcloudFormat, TimedPoint, TimedPointcloudMsg};

    fn header(stamp_ns: u64, frame_id: &str) -> MessageHeader {
        MessageHeader {
            stamp_ns,
            frame_id: frame_id.into(),
        }
    }

    fn structured(stamp_ns: u64) -> RawPointcloudMsg {
        structured_msg_from_points(
            header(stamp_ns, "os_sensor"),
            &[XyzPoint::new(1.0, 0.0, 0.0), XyzPoint::new(0.0, 1.0, 0.0)],
        )
        .into()
    }

    fn ingestor(config: PointcloudInputConfig) -> (PointcloudIngestor, crate::QueueConsumer) {
        let (producer, consumer) = PointcloudQueue::new(config.topic_queue_length);
        let ingestor = PointcloudIngestor::new(&config, producer, Arc::new(IngestionMetrics::new()));
        (ingestor, consumer)
    }

    #[test]
    fn test_misordered_fields_never_enqueued() {
        let (ingestor, mut consumer) =
            ingestor(PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2));

        assert!(ingestor.on_message(structured(100)));

        let mut bad = structured(200);
        if let RawPointcloudMsg::Structured(msg) = &mut bad {
            msg.fields[1].name = "z".into();
            msg.fields[2].name = "y".into();
        }
        assert!(!ingestor.on_message(bad));

        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer.pop().map(|c| c.timebase()), Some(100));
        let snapshot = ingestor.metrics.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.messages_rejected, 1);
        assert_eq!(snapshot.points_enqueued, 2);
    }

    #[test]
    fn test_empty_and_wrong_format_rejected() {
        let (ingestor, mut consumer) =
            ingestor(PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2));

        let empty = structured_msg_from_points(header(100, "os_sensor"), &[]).into();
        assert_eq!(ingestor.ingest(&empty), Err(IngestionError::EmptyPointcloud));

        let timed = RawPointcloudMsg::from(TimedPointcloudMsg {
            header: header(100, "livox"),
            timebase: 100,
            lidar_id: 0,
            points: vec![],
        });
        assert!(matches!(
            ingestor.ingest(&timed),
            Err(IngestionError::FormatMismatch { .. })
        ));
        assert!(consumer.is_empty());
    }

    fn with_structured(msg: RawPointcloudMsg, edit: impl FnOnce(&mut contracts::StructuredPointcloudMsg)) -> RawPointcloudMsg {
        let mut msg = msg;
        if let RawPointcloudMsg::Structured(inner) = &mut msg {
            edit(inner);
        }
        msg
    }

    #[test]
    fn test_empty_livox_rejected() {
        let (ingestor, mut consumer) =
            ingestor(PointcloudInputConfig::new("livox/lidar", PointcloudFormat::Livox));

        let empty = RawPointcloudMsg::from(TimedPointcloudMsg {
            header: header(100, "livox"),
            timebase: 100,
            lidar_id: 0,
            points: vec![],
        });
        assert_eq!(ingestor.ingest(&empty), Err(IngestionError::EmptyPointcloud));
        assert!(!ingestor.on_message(empty));
        assert!(consumer.is_empty());
        assert_eq!(ingestor.metrics.snapshot().messages_rejected, 1);
    }

    #[test]
    fn test_field_invalid_messages_never_enqueued() {
        let (ingestor, mut consumer) =
            ingestor(PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2));

        let rejected = [
            // z missing
            with_structured(structured(100), |m| m.fields.truncate(2)),
            // y before x
            with_structured(structured(200), |m| {
                m.fields[0].name = "y".into();
                m.fields[1].name = "x".into();
            }),
            // header claims far more points than the data holds
            with_structured(structured(300), |m| {
                m.height = 1 << 16;
                m.width = 1 << 16;
            }),
            // sizes that overflow
            with_structured(structured(400), |m| {
                m.height = u32::MAX;
                m.width = u32::MAX;
                m.point_step = u32::MAX;
            }),
            with_structured(structured(500), |m| m.fields[2].offset = u32::MAX),
        ];
        let count = rejected.len();
        for msg in rejected {
            assert!(!ingestor.on_message(msg));
        }

        assert!(consumer.is_empty());
        let snapshot = ingestor.metrics.snapshot();
        assert_eq!(snapshot.messages_received, count as u64);
        assert_eq!(snapshot.messages_rejected, count as u64);
        assert_eq!(snapshot.points_enqueued, 0);
    }

    #[test]
    fn test_lying_header_reports_truncation() {
        let (ingestor, _consumer) =
            ingestor(PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2));
        let msg = with_structured(structured(100), |m| {
            m.height = 1 << 16;
            m.width = 1 << 16;
        });
        assert!(matches!(
            ingestor.normalize(&msg),
            Err(IngestionError::TruncatedData { actual: 32, .. })
        ));
    }

    #[test]
    fn test_time_offset_and_frame_override() {
        let mut config = PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2);
        config.time_offset = -0.000_000_05;
        config.sensor_frame_id = Some("lidar_override".into());
        let (ingestor, mut consumer) = ingestor(config);

        ingestor.ingest(&structured(1_000)).unwrap();
        let cloud = consumer.pop().unwrap();
        assert_eq!(cloud.timebase(), 950);
        assert_eq!(cloud.sensor_frame(), "lidar_override");
    }

    #[test]
    fn test_empty_override_keeps_embedded_frame() {
        let mut config = PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2);
        config.sensor_frame_id = Some(String::new());
        let (ingestor, _consumer) = ingestor(config);

        let cloud = ingestor.normalize(&structured(1_000)).unwrap();
        assert_eq!(cloud.sensor_frame(), "os_sensor");
    }

    #[test]
    fn test_timed_cloud_uses_timebase_plus_offset() {
        let mut config = PointcloudInputConfig::new("livox/lidar", PointcloudFormat::Livox);
        config.time_offset = 0.000_001;
        let (ingestor, mut consumer) = ingestor(config);

        let msg = RawPointcloudMsg::from(TimedPointcloudMsg {
            header: header(99_999, "livox_frame"),
            timebase: 10_000,
            lidar_id: 1,
            points: (0..4)
                .map(|i| TimedPoint {
                    offset_time: i * 100,
                    x: i as f32,
                    y: 0.0,
                    z: 0.0,
                    reflectivity: 0,
                    tag: 0,
                    line: 0,
                })
                .collect(),
        });
        assert!(ingestor.on_message(msg));

        let cloud = consumer.pop().unwrap();
        assert_eq!(cloud.start_time(), 11_000);
        assert_eq!(cloud.end_time(), 11_300);
        assert_eq!(cloud.sensor_frame(), "livox_frame");
    }

    #[test]
    fn test_negative_offset_saturates_at_zero() {
        let mut config = PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2);
        config.time_offset = -1.0;
        let (ingestor, _consumer) = ingestor(config);
        assert_eq!(ingestor.normalize(&structured(10)).unwrap().timebase(), 0);
    }
}
