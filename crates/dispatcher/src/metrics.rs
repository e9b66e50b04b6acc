//! Debug sink metrics and dispatcher statistics

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Metrics for a single debug sink worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Messages waiting in the worker queue
    queue_len: AtomicUsize,
    /// Messages written
    write_count: AtomicU64,
    /// Failed writes
    failure_count: AtomicU64,
    /// Messages dropped because the worker queue was full
    dropped_count: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    pub fn inc_dropped_count(&self) {
        self.dropped_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            write_count: self.write_count(),
            failure_count: self.failure_count(),
            dropped_count: self.dropped_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub write_count: u64,
    pub failure_count: u64,
    pub dropped_count: u64,
}

/// Why a queued cloud was discarded without integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Start pose already evicted from the pose history
    StartTimeEvicted,
    /// End pose can never be resolved (evicted or unknown frame)
    EndTimeUnavailable,
    /// Interior pose missing between resolvable boundaries
    IntermediateTimeMissing,
    /// Direct lookup failed permanently
    PoseUnavailable,
    /// Waited for the pose longer than `max_wait_for_pose`
    WaitExceeded,
    /// Unrecognised undistortion outcome
    Unknown,
}

impl DropReason {
    pub const ALL: [DropReason; 6] = [
        Self::StartTimeEvicted,
        Self::EndTimeUnavailable,
        Self::IntermediateTimeMissing,
        Self::PoseUnavailable,
        Self::WaitExceeded,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartTimeEvicted => "start_time_evicted",
            Self::EndTimeUnavailable => "end_time_unavailable",
            Self::IntermediateTimeMissing => "intermediate_time_missing",
            Self::PoseUnavailable => "pose_unavailable",
            Self::WaitExceeded => "wait_exceeded",
            Self::Unknown => "unknown",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock time spent inside the integrators
///
/// Owned and updated by the dispatcher only.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegrationTimer {
    total: Duration,
    last: Duration,
    episodes: u64,
}

impl IntegrationTimer {
    pub fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.last = elapsed;
        self.episodes += 1;
    }

    /// Cumulative integration time
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Duration of the last episode
    pub fn last_episode(&self) -> Duration {
        self.last
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn mean(&self) -> Duration {
        if self.episodes == 0 {
            return Duration::ZERO;
        }
        self.total / self.episodes as u32
    }
}

/// Counters of one dispatcher
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatcherStats {
    pub integrated_clouds: u64,
    pub integrated_points: u64,
    /// Drain passes that stopped at a cloud waiting for its pose
    pub deferred_passes: u64,
    dropped: [u64; DropReason::ALL.len()],
}

impl DispatcherStats {
    pub fn record_drop(&mut self, reason: DropReason) {
        self.dropped[reason.index()] += 1;
    }

    pub fn dropped(&self, reason: DropReason) -> u64 {
        self.dropped[reason.index()]
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.iter().sum()
    }
}
