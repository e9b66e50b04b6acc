//! IntegrationDispatcher - drains the ingestion queue into the map integrators
//!
//! One drain pass inspects the head cloud without popping it and resolves its
//! pose, either by a single lookup at the timebase or through motion
//! undistortion. Then:
//! - pose not there yet and still within the wait budget: stop the pass and
//!   leave the queue untouched (head-of-line stall)
//! - pose permanently unavailable or wait budget spent: pop, drop, continue
//! - pose resolved: pop, integrate with every integrator in registration order

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    FrameId, GenericStampedPointcloud, MapIntegrator, PointcloudInputConfig, PoseSource,
    PosedPointcloud,
};
use ingestion::QueueConsumer;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use undistortion::{PointcloudUndistorter, PoseResolver, UndistortionError};

use crate::error::DispatcherError;
use crate::metrics::{DispatcherStats, DropReason, IntegrationTimer};
use crate::publisher::DebugPublisher;

/// Dispatcher configuration, derived from one input's config
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Input topic, for logs and metrics
    pub topic: String,
    /// Frame every cloud is posed in
    pub world_frame: FrameId,
    /// Compensate motion during capture
    pub undistort_motion: bool,
    /// Pose wait budget
    ///
    /// Bounds both the data-time wait and the wall time since the head cloud
    /// was first deferred. That wall clock starts at the first deferring pass,
    /// not at enqueue, so a cloud may wait up to `max_wait + retry_period`.
    pub max_wait: Duration,
    /// Period of the drain timer
    pub retry_period: Duration,
}

impl DispatcherConfig {
    pub fn from_input(input: &PointcloudInputConfig, world_frame: &str) -> Self {
        Self {
            topic: input.topic_name.clone(),
            world_frame: FrameId::new(world_frame),
            undistort_motion: input.undistort_motion,
            max_wait: input.max_wait(),
            retry_period: input.retry_period(),
        }
    }
}

/// Result of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub integrated: usize,
    pub dropped: usize,
    /// The pass stopped at a cloud waiting for its pose
    pub deferred: bool,
    /// Clouds left in the queue after the pass
    pub queue_depth: usize,
    /// Time spent inside the integrators during the pass
    pub integration_time: Duration,
}

/// Outcome of resolving the head cloud
enum Resolution {
    Posed(PosedPointcloud),
    /// Pose may still arrive; `boundary_ns` is the stamp being waited for
    NotYet {
        boundary_ns: u64,
        error: String,
    },
    Failed {
        reason: DropReason,
        error: String,
    },
}

/// What is known about the head cloud once its borrow ends
struct HeadCloud {
    frame: FrameId,
    start_ns: u64,
    end_ns: u64,
    median_ns: u64,
    num_points: usize,
}

impl HeadCloud {
    fn of(cloud: &GenericStampedPointcloud) -> Self {
        Self {
            frame: cloud.sensor_frame().clone(),
            start_ns: cloud.start_time(),
            end_ns: cloud.end_time(),
            median_ns: cloud.median_time(),
            num_points: cloud.len(),
        }
    }
}

/// Single-consumer integration loop for one input
pub struct IntegrationDispatcher {
    config: DispatcherConfig,
    resolver: PoseResolver,
    undistorter: Option<PointcloudUndistorter>,
    integrators: Vec<Box<dyn MapIntegrator>>,
    /// First integrator can export range images (decided at registration)
    first_exports_range_image: bool,
    publisher: DebugPublisher,
    timer: IntegrationTimer,
    stats: DispatcherStats,
    /// When the current head cloud was first deferred
    head_deferred_since: Option<Instant>,
}

impl IntegrationDispatcher {
    pub fn new(config: DispatcherConfig, pose_source: Arc<dyn PoseSource>) -> Self {
        let resolver = PoseResolver::new(pose_source, config.world_frame.clone());
        let undistorter = config
            .undistort_motion
            .then(|| PointcloudUndistorter::new(resolver.clone()));
        Self {
            config,
            resolver,
            undistorter,
            integrators: Vec::new(),
            first_exports_range_image: false,
            publisher: DebugPublisher::disabled(),
            timer: IntegrationTimer::default(),
            stats: DispatcherStats::default(),
            head_deferred_since: None,
        }
    }

    /// Dispatcher for a validated input, with its debug outputs
    #[instrument(
        name = "dispatcher_from_input",
        skip(input, pose_source),
        fields(topic = %input.topic_name)
    )]
    pub async fn from_input(
        input: &PointcloudInputConfig,
        world_frame: &str,
        pose_source: Arc<dyn PoseSource>,
    ) -> Result<Self, DispatcherError> {
        let input = input.clone().check_valid()?;
        if world_frame.trim().is_empty() {
            return Err(DispatcherError::EmptyWorldFrame {
                topic: input.topic_name,
            });
        }
        let publisher = DebugPublisher::from_config(
            input.reprojected_pointcloud.as_ref(),
            input.projected_range_image.as_ref(),
        )
        .await?;
        Ok(Self::new(DispatcherConfig::from_input(&input, world_frame), pose_source)
            .with_publisher(publisher))
    }

    pub fn with_publisher(mut self, publisher: DebugPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    /// Append an integrator; clouds reach integrators in registration order
    pub fn register_integrator(&mut self, integrator: Box<dyn MapIntegrator>) {
        if self.integrators.is_empty() {
            self.first_exports_range_image = integrator.supports_range_image_export();
        }
        debug!(
            topic = %self.config.topic,
            integrator = integrator.name(),
            position = self.integrators.len(),
            "registered integrator"
        );
        self.integrators.push(integrator);
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn integrators(&self) -> &[Box<dyn MapIntegrator>] {
        &self.integrators
    }

    pub fn timer(&self) -> &IntegrationTimer {
        &self.timer
    }

    pub fn stats(&self) -> &DispatcherStats {
        &self.stats
    }

    pub fn publisher(&self) -> &DebugPublisher {
        &self.publisher
    }

    /// One drain pass over the queue
    ///
    /// Never blocks on a pose and never reorders: it returns as soon as the
    /// head cloud has to wait.
    pub fn process_queue(&mut self, queue: &mut QueueConsumer) -> DrainReport {
        let mut report = DrainReport::default();

        loop {
            let newest_queued_ns = queue.back().map(GenericStampedPointcloud::timebase);
            let Some(cloud) = queue.front() else {
                break;
            };
            let head = HeadCloud::of(cloud);
            let resolution = self.resolve(cloud);

            match resolution {
                Resolution::Posed(posed) => {
                    queue.pop();
                    self.head_deferred_since = None;
                    let remaining = queue.len();
                    report.integration_time += self.integrate(&head, posed, remaining);
                    report.integrated += 1;
                }
                Resolution::NotYet { boundary_ns, error } => {
                    let reference_ns = newest_queued_ns
                        .unwrap_or(boundary_ns)
                        .max(self.resolver.newest_timestamp(&head.frame).unwrap_or(0));
                    let waited_ns = reference_ns.saturating_sub(boundary_ns);
                    let deferred_since = *self.head_deferred_since.get_or_insert_with(Instant::now);
                    let waited_wall = deferred_since.elapsed();

                    if Duration::from_nanos(waited_ns) < self.config.max_wait
                        && waited_wall < self.config.max_wait
                    {
                        debug!(
                            topic = %self.config.topic,
                            sensor_frame = %head.frame,
                            boundary_ns,
                            waited_ns,
                            waited_wall_ms = waited_wall.as_millis() as u64,
                            error = %error,
                            "waiting for pose, deferring queue"
                        );
                        self.stats.deferred_passes += 1;
                        observability::record_queue_deferred(&self.config.topic);
                        report.deferred = true;
                        break;
                    }

                    let waited = Duration::from_nanos(waited_ns).max(waited_wall);
                    queue.pop();
                    self.drop_head(&head, DropReason::WaitExceeded, &error, Some(waited));
                    report.dropped += 1;
                }
                Resolution::Failed { reason, error } => {
                    queue.pop();
                    self.drop_head(&head, reason, &error, None);
                    report.dropped += 1;
                }
            }
        }

        report.queue_depth = queue.len();
        observability::record_queue_depth(&self.config.topic, report.queue_depth);
        report
    }

    /// Drain periodically until `shutdown` resolves
    ///
    /// `on_pass` sees the report of every drain pass.
    #[instrument(name = "dispatcher_run", skip_all, fields(topic = %self.config.topic))]
    pub async fn run<S, F>(&mut self, queue: &mut QueueConsumer, shutdown: S, mut on_pass: F)
    where
        S: Future<Output = ()>,
        F: FnMut(&DrainReport),
    {
        let mut ticker = tokio::time::interval(self.config.retry_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            topic = %self.config.topic,
            integrators = self.integrators.len(),
            undistort_motion = self.config.undistort_motion,
            retry_period_ms = self.config.retry_period.as_millis() as u64,
            "Dispatcher started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    let report = self.process_queue(queue);
                    on_pass(&report);
                }
            }
        }

        info!(
            topic = %self.config.topic,
            integrated = self.stats.integrated_clouds,
            dropped = self.stats.total_dropped(),
            pending = queue.len(),
            "Dispatcher stopped"
        );
    }

    /// Stop the debug sink workers and hand back the final counters
    pub async fn shutdown(self) -> (DispatcherStats, IntegrationTimer) {
        self.publisher.shutdown().await;
        (self.stats, self.timer)
    }

    fn resolve(&self, cloud: &GenericStampedPointcloud) -> Resolution {
        match &self.undistorter {
            Some(undistorter) => Self::classify_undistortion(cloud, undistorter.undistort(cloud)),
            None => match self.resolver.lookup(cloud.sensor_frame(), cloud.timebase()) {
                Ok(pose) => Resolution::Posed(PosedPointcloud::from_stamped(pose, cloud)),
                Err(e) if e.is_retryable() => Resolution::NotYet {
                    boundary_ns: cloud.timebase(),
                    error: e.to_string(),
                },
                Err(e) => Resolution::Failed {
                    reason: DropReason::PoseUnavailable,
                    error: e.to_string(),
                },
            },
        }
    }

    fn classify_undistortion(
        cloud: &GenericStampedPointcloud,
        result: Result<PosedPointcloud, UndistortionError>,
    ) -> Resolution {
        match result {
            Ok(posed) => Resolution::Posed(posed),
            Err(e) if e.is_retryable() => Resolution::NotYet {
                boundary_ns: cloud.end_time(),
                error: e.to_string(),
            },
            Err(e @ UndistortionError::EndTimeNotInBuffer { .. }) => Resolution::Failed {
                reason: DropReason::EndTimeUnavailable,
                error: e.to_string(),
            },
            Err(e @ UndistortionError::StartTimeNotInBuffer { .. }) => Resolution::Failed {
                reason: DropReason::StartTimeEvicted,
                error: e.to_string(),
            },
            Err(e @ UndistortionError::IntermediateTimeNotInBuffer { .. }) => Resolution::Failed {
                reason: DropReason::IntermediateTimeMissing,
                error: e.to_string(),
            },
            Err(e) => Resolution::Failed {
                reason: DropReason::Unknown,
                error: e.to_string(),
            },
        }
    }

    fn integrate(&mut self, head: &HeadCloud, posed: PosedPointcloud, remaining: usize) -> Duration {
        let started = std::time::Instant::now();
        for integrator in &mut self.integrators {
            integrator.integrate_pointcloud(&posed);
        }
        let elapsed = started.elapsed();
        self.timer.record(elapsed);
        self.stats.integrated_clouds += 1;
        self.stats.integrated_points += posed.len() as u64;

        info!(
            topic = %self.config.topic,
            sensor_frame = %head.frame,
            points = head.num_points,
            remaining,
            last_episode_ms = elapsed.as_secs_f64() * 1e3,
            total_s = self.timer.total().as_secs_f64(),
            "integrated pointcloud"
        );
        observability::record_pointcloud_integrated(&self.config.topic, elapsed);

        self.publisher.publish_pointcloud(head.median_ns, &posed);
        if self.first_exports_range_image && self.publisher.wants_range_image() {
            if let Some(image) = self
                .integrators
                .first()
                .and_then(|integrator| integrator.last_posed_range_image())
            {
                self.publisher.publish_range_image(head.median_ns, image);
            }
        }
        elapsed
    }

    fn drop_head(
        &mut self,
        head: &HeadCloud,
        reason: DropReason,
        error: &str,
        waited: Option<Duration>,
    ) {
        self.head_deferred_since = None;
        self.stats.record_drop(reason);
        observability::record_pointcloud_dropped(&self.config.topic, reason.as_str());

        if reason == DropReason::IntermediateTimeMissing {
            error!(
                topic = %self.config.topic,
                sensor_frame = %head.frame,
                world_frame = %self.config.world_frame,
                start_ns = head.start_ns,
                end_ns = head.end_ns,
                error = %error,
                "intermediate pose missing although both boundaries resolved, dropping pointcloud"
            );
            return;
        }

        warn!(
            topic = %self.config.topic,
            sensor_frame = %head.frame,
            world_frame = %self.config.world_frame,
            reason = %reason,
            start_ns = head.start_ns,
            end_ns = head.end_ns,
            span_ms = (head.end_ns - head.start_ns) as f64 / 1e6,
            waited_ms = waited.map(|w| w.as_secs_f64() * 1e3),
            max_wait_ms = self.config.max_wait.as_secs_f64() * 1e3,
            error = %error,
            "dropping pointcloud"
        );
    }
}
