//! Ingestion queue - multi-producer, single-consumer FIFO of stamped clouds
//!
//! Producers push through a cloneable [`QueueProducer`] from any thread and
//! never block. The single [`QueueConsumer`] moves arrivals into a local
//! `VecDeque`, which is what allows inspecting the head without removing it.

use std::collections::VecDeque;

use async_channel::{unbounded, Receiver, Sender};
use contracts::GenericStampedPointcloud;

use crate::error::{IngestionError, Result};

/// Queue constructor
pub struct PointcloudQueue;

impl PointcloudQueue {
    /// Create a queue; `capacity_hint` only pre-sizes the consumer's buffer
    pub fn new(capacity_hint: usize) -> (QueueProducer, QueueConsumer) {
        let (tx, rx) = unbounded();
        (
            QueueProducer { tx },
            QueueConsumer {
                rx,
                pending: VecDeque::with_capacity(capacity_hint),
            },
        )
    }
}

/// Producer handle, one clone per subscription
#[derive(Debug, Clone)]
pub struct QueueProducer {
    tx: Sender<GenericStampedPointcloud>,
}

impl QueueProducer {
    /// Hand a cloud over to the consumer
    ///
    /// Fails only once the consumer has been dropped.
    pub fn push(&self, cloud: GenericStampedPointcloud) -> Result<()> {
        self.tx
            .try_send(cloud)
            .map_err(|_| IngestionError::QueueClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The single consumer side
///
/// Not `Clone`: exactly one context drains the queue.
#[derive(Debug)]
pub struct QueueConsumer {
    rx: Receiver<GenericStampedPointcloud>,
    pending: VecDeque<GenericStampedPointcloud>,
}

impl QueueConsumer {
    fn collect_arrivals(&mut self) {
        while let Ok(cloud) = self.rx.try_recv() {
            self.pending.push_back(cloud);
        }
    }

    /// Oldest cloud, left in place
    pub fn front(&mut self) -> Option<&GenericStampedPointcloud> {
        self.collect_arrivals();
        self.pending.front()
    }

    /// Newest cloud, left in place
    pub fn back(&mut self) -> Option<&GenericStampedPointcloud> {
        self.collect_arrivals();
        self.pending.back()
    }

    /// Remove and return the oldest cloud
    pub fn pop(&mut self) -> Option<GenericStampedPointcloud> {
        self.collect_arrivals();
        self.pending.pop_front()
    }

    pub fn len(&mut self) -> usize {
        self.collect_arrivals();
        self.pending.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Wait until at least one cloud is pending
    ///
    /// Returns `false` when every producer is gone and nothing is left.
    pub async fn wait_for_cloud(&mut self) -> bool {
        if !self.is_empty() {
            return true;
        }
        match self.rx.recv().await {
            Ok(cloud) => {
                self.pending.push_back(cloud);
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn cloud(timebase: u64, frame: &str) -> GenericStampedPointcloud {
        let mut cloud = GenericStampedPointcloud::with_capacity(timebase, frame, 1);
        cloud.push(0.0, 0.0, 0.0, 0);
        cloud
    }

    #[test]
    fn test_peek_does_not_pop() {
        let (producer, mut consumer) = PointcloudQueue::new(4);
        producer.push(cloud(1, "a")).unwrap();
        producer.push(cloud(2, "a")).unwrap();

        assert_eq!(consumer.front().map(|c| c.timebase()), Some(1));
        assert_eq!(consumer.front().map(|c| c.timebase()), Some(1));
        assert_eq!(consumer.back().map(|c| c.timebase()), Some(2));
        assert_eq!(consumer.len(), 2);

        assert_eq!(consumer.pop().map(|c| c.timebase()), Some(1));
        assert_eq!(consumer.len(), 1);
    }

    #[test]
    fn test_concurrent_producers_keep_enqueue_order() {
        let (producer, mut consumer) = PointcloudQueue::new(16);
        let handles: Vec<_> = ["front", "rear", "top"]
            .into_iter()
            .map(|frame| {
                let producer = producer.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        producer.push(cloud(i, frame)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(consumer.len(), 1500);
        // per-producer order survives interleaving
        let mut last: std::collections::HashMap<String, u64> = Default::default();
        while let Some(cloud) = consumer.pop() {
            let frame = cloud.sensor_frame().to_string();
            if let Some(prev) = last.get(&frame) {
                assert!(cloud.timebase() > *prev);
            }
            last.insert(frame, cloud.timebase());
        }
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_push_fails_after_consumer_dropped() {
        let (producer, consumer) = PointcloudQueue::new(1);
        drop(consumer);
        assert!(producer.is_closed());
        assert_eq!(producer.push(cloud(1, "a")), Err(IngestionError::QueueClosed));
    }
}
