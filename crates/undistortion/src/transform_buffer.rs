//! In-memory transform buffer with bounded history.
//!
//! One ring buffer of stamped poses per child frame. When the ring is full the
//! oldest sample is overwritten, and samples older than the retention window
//! are evicted on insert, so lookups below the retained history fail with
//! `TooOld` while lookups past the newest sample fail with `NotYetAvailable`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use contracts::{FrameId, PoseLookupError, PoseSource, Transformation3D};
use ringbuf::{traits::*, HeapRb};
use tracing::{debug, trace};

use crate::interpolation::interpolate_pose;

#[derive(Debug, Clone, Copy)]
struct StampedTransform {
    stamp_ns: u64,
    pose: Transformation3D,
}

/// History of one child frame relative to its parent
struct FrameHistory {
    parent: FrameId,
    samples: HeapRb<StampedTransform>,
}

impl FrameHistory {
    fn oldest(&self) -> Option<StampedTransform> {
        self.samples.iter().next().copied()
    }

    fn newest(&self) -> Option<StampedTransform> {
        self.samples.iter().last().copied()
    }

    fn evict_older_than(&mut self, cutoff_ns: u64) -> usize {
        let mut evicted = 0;
        while self
            .oldest()
            .is_some_and(|sample| sample.stamp_ns < cutoff_ns)
        {
            let _ = self.samples.try_pop();
            evicted += 1;
        }
        evicted
    }

    fn lookup(&self, frame: &str, stamp_ns: u64) -> Result<Transformation3D, PoseLookupError> {
        let (Some(oldest), Some(newest)) = (self.oldest(), self.newest()) else {
            return Err(PoseLookupError::NotYetAvailable {
                frame: frame.to_string(),
                stamp_ns,
                newest_ns: 0,
            });
        };

        if stamp_ns < oldest.stamp_ns {
            return Err(PoseLookupError::TooOld {
                frame: frame.to_string(),
                stamp_ns,
                oldest_ns: oldest.stamp_ns,
            });
        }
        if stamp_ns > newest.stamp_ns {
            return Err(PoseLookupError::NotYetAvailable {
                frame: frame.to_string(),
                stamp_ns,
                newest_ns: newest.stamp_ns,
            });
        }

        let mut before = oldest;
        for sample in self.samples.iter() {
            if sample.stamp_ns == stamp_ns {
                return Ok(sample.pose);
            }
            if sample.stamp_ns > stamp_ns {
                let span = (sample.stamp_ns - before.stamp_ns) as f64;
                let t = (stamp_ns - before.stamp_ns) as f64 / span;
                return Ok(interpolate_pose(&before.pose, &sample.pose, t as f32));
            }
            before = *sample;
        }
        Ok(newest.pose)
    }
}

/// Thread-safe transform buffer
///
/// Writers (pose producers) and readers (the dispatcher) may live on different
/// threads.
pub struct TransformBuffer {
    frames: RwLock<HashMap<FrameId, FrameHistory>>,
    capacity: usize,
    retention_ns: Option<u64>,
}

impl fmt::Debug for TransformBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("TransformBuffer")
            .field("frames", &frames.len())
            .field("capacity", &self.capacity)
            .field("retention_ns", &self.retention_ns)
            .finish()
    }
}

impl TransformBuffer {
    /// Buffer keeping at most `capacity` samples per frame
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            retention_ns: None,
        }
    }

    /// Buffer that also evicts samples older than `retention_ns` behind the newest
    pub fn with_retention(capacity: usize, retention_ns: u64) -> Self {
        Self {
            retention_ns: Some(retention_ns),
            ..Self::new(capacity)
        }
    }

    /// Record the pose of `child` in `parent` at `stamp_ns`
    ///
    /// Samples must arrive in stamp order per frame; returns `false` and
    /// ignores the sample otherwise, or when `child` was already registered
    /// under a different parent.
    pub fn insert(
        &self,
        parent: &str,
        child: &str,
        stamp_ns: u64,
        pose: Transformation3D,
    ) -> bool {
        let mut frames = self.frames.write().unwrap_or_else(PoisonError::into_inner);
        let history = frames
            .entry(FrameId::new(child))
            .or_insert_with(|| FrameHistory {
                parent: FrameId::new(parent),
                samples: HeapRb::new(self.capacity),
            });

        if history.parent != parent {
            debug!(child, parent, existing = %history.parent, "transform parent mismatch, ignoring");
            return false;
        }
        if history
            .newest()
            .is_some_and(|newest| stamp_ns < newest.stamp_ns)
        {
            trace!(child, stamp_ns, "out-of-order transform ignored");
            return false;
        }

        let _ = history
            .samples
            .push_overwrite(StampedTransform { stamp_ns, pose });

        if let Some(retention) = self.retention_ns {
            let evicted = history.evict_older_than(stamp_ns.saturating_sub(retention));
            if evicted > 0 {
                trace!(child, evicted, "evicted expired transforms");
            }
        }
        true
    }

    /// Oldest stamp still buffered for `child`
    pub fn oldest_timestamp(&self, child: &str) -> Option<u64> {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        frames
            .get(child)
            .and_then(FrameHistory::oldest)
            .map(|s| s.stamp_ns)
    }

    /// Number of samples buffered for `child`
    pub fn len(&self, child: &str) -> usize {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        frames
            .get(child)
            .map(|h| h.samples.occupied_len())
            .unwrap_or(0)
    }

    /// Whether nothing is buffered for `child`
    pub fn is_empty(&self, child: &str) -> bool {
        self.len(child) == 0
    }
}

impl PoseSource for TransformBuffer {
    fn lookup_transform(
        &self,
        world_frame: &str,
        sensor_frame: &str,
        stamp_ns: u64,
    ) -> Result<Transformation3D, PoseLookupError> {
        if world_frame == sensor_frame {
            return Ok(Transformation3D::identity());
        }

        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        match frames.get(sensor_frame) {
            Some(history) if history.parent == world_frame => {
                history.lookup(sensor_frame, stamp_ns)
            }
            // never seen yet, its first pose may still be on the way
            None => Err(PoseLookupError::NotYetAvailable {
                frame: sensor_frame.to_string(),
                stamp_ns,
                newest_ns: 0,
            }),
            Some(_) => Err(PoseLookupError::UnknownFrame {
                world_frame: world_frame.to_string(),
                sensor_frame: sensor_frame.to_string(),
            }),
        }
    }

    fn newest_timestamp(&self, world_frame: &str, sensor_frame: &str) -> Option<u64> {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        frames
            .get(sensor_frame)
            .filter(|h| h.parent == world_frame)
            .and_then(FrameHistory::newest)
            .map(|s| s.stamp_ns)
    }
}
