//! SinkHandle - one debug sink behind its own bounded queue and worker task
//!
//! The dispatcher only ever calls [`SinkHandle::publish`], which never waits:
//! a slow or failing sink loses messages, it never delays integration.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace, warn};

use contracts::{DebugMessage, DebugSink, SubscriberGauge};

use crate::metrics::SinkMetrics;

/// What happened to a published message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Handed to the worker
    Queued,
    /// Worker backlog full, message discarded
    QueueFull,
    /// Worker already gone
    Closed,
}

impl PublishOutcome {
    pub fn is_queued(self) -> bool {
        self == Self::Queued
    }
}

/// Handle to a running debug sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<DebugMessage>,
    subscribers: SubscriberGauge,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Move `sink` onto a worker task fed by a queue of `queue_capacity`
    pub fn spawn<S: DebugSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let subscribers = sink.subscribers();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = tokio::spawn(sink_worker(
            sink,
            rx,
            subscribers.clone(),
            Arc::clone(&metrics),
        ));

        Self {
            name,
            tx,
            subscribers,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Whether anyone listens on the other side of the sink
    pub fn has_subscribers(&self) -> bool {
        self.subscribers.has_subscribers()
    }

    /// Queue a message for the worker without waiting
    pub fn publish(&self, message: DebugMessage) -> PublishOutcome {
        let outcome = match self.tx.try_send(message) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                PublishOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.metrics.inc_dropped_count();
                warn!(
                    sink = %self.name,
                    kind = message.kind(),
                    stamp_ns = message.stamp_ns(),
                    "debug sink backlog full, message dropped"
                );
                PublishOutcome::QueueFull
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "debug sink worker is gone");
                PublishOutcome::Closed
            }
        };
        observability::record_debug_published(&self.name, outcome.is_queued());
        outcome
    }

    /// Let the worker drain its backlog, then flush and close the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "debug sink worker panicked");
        }
    }
}

/// Writes queued messages until every sender is gone
///
/// Messages queued while someone listened are skipped once the last listener
/// has left, so a disconnected subscriber does not cost a serialization.
#[instrument(name = "sink_worker", skip_all, fields(sink = %sink.name()))]
async fn sink_worker<S: DebugSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<DebugMessage>,
    subscribers: SubscriberGauge,
    metrics: Arc<SinkMetrics>,
) {
    debug!("debug sink worker started");

    while let Some(message) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        if !subscribers.has_subscribers() {
            metrics.inc_dropped_count();
            trace!(kind = message.kind(), stamp_ns = message.stamp_ns(), "no subscribers left, skipping");
            continue;
        }

        match sink.write(&message).await {
            Ok(()) => metrics.inc_write_count(),
            Err(e) => {
                metrics.inc_failure_count();
                error!(
                    kind = message.kind(),
                    stamp_ns = message.stamp_ns(),
                    error = %e,
                    "debug sink write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "debug sink flush failed");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "debug sink close failed");
    }

    debug!(
        written = metrics.write_count(),
        failed = metrics.failure_count(),
        dropped = metrics.dropped_count(),
        "debug sink worker stopped"
    );
}
