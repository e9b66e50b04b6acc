//! DebugSink trait - debug republishing output interface

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{ContractError, PosedPointcloud, PosedRangeImage};

/// Debug payload together with the stamp it is published under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DebugMessage {
    /// Just-integrated cloud, stamped with the cloud's median time
    Pointcloud {
        stamp_ns: u64,
        pointcloud: PosedPointcloud,
    },
    /// Range image from the first integrator, same stamp
    RangeImage {
        stamp_ns: u64,
        range_image: PosedRangeImage,
    },
}

impl DebugMessage {
    pub fn stamp_ns(&self) -> u64 {
        match self {
            Self::Pointcloud { stamp_ns, .. } | Self::RangeImage { stamp_ns, .. } => *stamp_ns,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pointcloud { .. } => "pointcloud",
            Self::RangeImage { .. } => "range_image",
        }
    }
}

/// Shared count of listeners attached to a debug sink
///
/// The sink updates it, the publisher reads it before doing any work.
#[derive(Debug, Clone, Default)]
pub struct SubscriberGauge(Arc<AtomicUsize>);

impl SubscriberGauge {
    pub fn new(initial: usize) -> Self {
        Self(Arc::new(AtomicUsize::new(initial)))
    }

    pub fn subscribe(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unsubscribe(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }

    pub fn has_subscribers(&self) -> bool {
        self.count() > 0
    }
}

/// Debug output trait
#[trait_variant::make(DebugSink: Send)]
pub trait LocalDebugSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Listener gauge, cloned by the publisher at registration
    fn subscribers(&self) -> SubscriberGauge;

    /// Publish one debug message
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, message: &DebugMessage) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
