//! 通用订阅适配器
//!
//! 把 `PointcloudSource` 的回调接到对应输入的 `PointcloudIngestor`，
//! 使 IngestionPipeline 以统一方式处理 Mock 和真实传输层。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use contracts::{PointcloudCallback, PointcloudSource};
use tracing::{debug, trace};

use crate::ingestor::PointcloudIngestor;

/// 单个订阅：一个传输源 + 其所属输入的 ingestor
pub struct SourceSubscription {
    source: Box<dyn PointcloudSource>,
    ingestor: Arc<PointcloudIngestor>,
    listening: Arc<AtomicBool>,
}

impl SourceSubscription {
    pub fn new(source: Box<dyn PointcloudSource>, ingestor: Arc<PointcloudIngestor>) -> Self {
        Self {
            source,
            ingestor,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn topic(&self) -> &str {
        self.source.topic()
    }

    /// 开始接收，重复调用无副作用
    pub fn start(&self) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let ingestor = self.ingestor.clone();
        let listening = self.listening.clone();

        debug!(topic = %self.source.topic(), format = %self.source.format(), "starting subscription");

        let callback: PointcloudCallback = Arc::new(move |msg| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            trace!(topic = %ingestor.topic(), "subscription received message");
            ingestor.on_message(msg);
        });

        self.source.listen(callback);
    }

    pub fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(topic = %self.source.topic(), "stopping subscription");
            self.source.stop();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{structured_msg_from_points, XyzPoint};
    use crate::metrics::IngestionMetrics;
    use crate::queue::PointcloudQueue;
    use contracts::{MessageHeader, PointcloudFormat, PointcloudInputConfig};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ManualState {
        callback: Mutex<Option<PointcloudCallback>>,
        listening: AtomicBool,
    }

    /// Source that only delivers when the test asks it to
    #[derive(Clone, Default)]
    struct ManualSource(Arc<ManualState>);

    impl PointcloudSource for ManualSource {
        fn topic(&self) -> &str {
            "manual"
        }

        fn format(&self) -> PointcloudFormat {
            PointcloudFormat::PointCloud2
        }

        fn listen(&self, callback: PointcloudCallback) {
            self.0.listening.store(true, Ordering::SeqCst);
            *self.0.callback.lock().unwrap() = Some(callback);
        }

        fn stop(&self) {
            self.0.listening.store(false, Ordering::SeqCst);
        }

        fn is_listening(&self) -> bool {
            self.0.listening.load(Ordering::SeqCst)
        }
    }

    impl ManualSource {
        fn emit(&self, stamp_ns: u64) {
            let msg = structured_msg_from_points(
                MessageHeader {
                    stamp_ns,
                    frame_id: "lidar".into(),
                },
                &[XyzPoint::new(1.0, 1.0, 1.0)],
            );
            if let Some(callback) = self.0.callback.lock().unwrap().as_ref() {
                callback(msg.into());
            }
        }
    }

    #[test]
    fn test_subscription_forwards_until_stopped() {
        let config = PointcloudInputConfig::new("manual", PointcloudFormat::PointCloud2);
        let (producer, mut consumer) = PointcloudQueue::new(4);
        let ingestor = Arc::new(PointcloudIngestor::new(
            &config,
            producer,
            Arc::new(IngestionMetrics::new()),
        ));

        let source = ManualSource::default();
        let subscription = SourceSubscription::new(Box::new(source.clone()), ingestor);

        subscription.start();
        subscription.start();
        assert!(subscription.is_listening());
        assert!(source.is_listening());

        source.emit(1);
        source.emit(2);
        subscription.stop();
        source.emit(3);

        assert!(!source.is_listening());
        assert_eq!(consumer.len(), 2);
    }
}
