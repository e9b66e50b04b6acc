//! Ingestion metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Ingestion counters shared by every subscription of a pipeline
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Raw messages received
    pub messages_received: AtomicU64,

    /// Messages rejected (empty, bad layout, wrong format)
    pub messages_rejected: AtomicU64,

    /// Clouds pushed onto a queue
    pub clouds_enqueued: AtomicU64,

    /// Points pushed onto a queue
    pub points_enqueued: AtomicU64,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self, num_points: usize) {
        self.clouds_enqueued.fetch_add(1, Ordering::Relaxed);
        self.points_enqueued
            .fetch_add(num_points as u64, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            clouds_enqueued: self.clouds_enqueued.load(Ordering::Relaxed),
            points_enqueued: self.points_enqueued.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_rejected: u64,
    pub clouds_enqueued: u64,
    pub points_enqueued: u64,
}
