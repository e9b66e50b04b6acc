//! Pipeline orchestrator - coordinates all components.
//!
//! Runs every configured input against mock sensors whose poses come from a
//! simulated trajectory, one dispatcher task per input.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{
    FrameId, IntegratorConfig, PipelineBlueprint, PointcloudFormat, PointcloudInputConfig,
    SimulationConfig,
};
use dispatcher::{create_integrator, IntegrationDispatcher, LogIntegrator};
use ingestion::{IngestionPipeline, MockClock, MockPointcloudSource};
use observability::{PassSample, PipelineMetricsAggregator};
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use undistortion::TransformBuffer;

use super::trajectory::{CircularTrajectory, TrajectoryPublisher};
use super::{InputRunStats, PipelineStats};
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The pipeline blueprint
    pub blueprint: PipelineBlueprint,

    /// Stop after this many integrated clouds (None = unlimited)
    pub max_clouds: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout expires or enough clouds
    /// were integrated
    #[instrument(name = "pipeline_run", skip_all, fields(world_frame = %self.config.blueprint.world_frame))]
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let sim = &blueprint.simulation;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Transform buffer shared by the trajectory and all dispatchers
        let clock = MockClock::new();
        let capacity = (sim.pose_rate_hz * sim.pose_history_s).ceil() as usize + 1;
        let retention_ns = (sim.pose_history_s * 1e9) as u64;
        let poses = Arc::new(TransformBuffer::with_retention(capacity, retention_ns));

        info!("Setting up inputs...");
        let mut ingestion = IngestionPipeline::new();
        let mut lanes = Vec::with_capacity(blueprint.inputs.len());
        let mut sensor_frames = Vec::with_capacity(blueprint.inputs.len());

        for (idx, input) in blueprint.inputs.iter().enumerate() {
            let consumer = ingestion
                .register_input(input.clone())
                .map_err(|e| CliError::input_setup(&input.topic_name, e.to_string()))?;

            let embedded_frame = format!("lidar_{idx}");
            ingestion.register_source(Box::new(mock_source(input, &embedded_frame, sim, clock)))?;

            let mut dispatcher =
                IntegrationDispatcher::from_input(input, &blueprint.world_frame, poses.clone())
                    .await
                    .with_context(|| format!("Failed to create dispatcher for '{}'", input.topic_name))?;
            register_integrators(&mut dispatcher, &blueprint.integrators);

            let frame = FrameId::resolve(input.sensor_frame_id.as_deref(), &embedded_frame);
            info!(
                topic = %input.topic_name,
                format = %input.topic_type,
                sensor_frame = %frame,
                undistort_motion = input.undistort_motion,
                integrators = dispatcher.integrators().len(),
                "Input configured"
            );
            sensor_frames.push(frame.to_string());
            lanes.push((input.topic_name.clone(), dispatcher, consumer));
        }
        sensor_frames.sort();
        sensor_frames.dedup();

        let (stop_tx, stop_rx) = watch::channel(false);
        let stop_tx = Arc::new(stop_tx);

        let trajectory = TrajectoryPublisher::new(
            poses.clone(),
            &blueprint.world_frame,
            sensor_frames,
            CircularTrajectory::from_simulation(sim, clock.now_ns()),
            clock,
            sim,
        );
        let trajectory_task = tokio::spawn(trajectory.run(stop_rx.clone()));

        let pass_metrics = Arc::new(Mutex::new(PipelineMetricsAggregator::new()));
        let integrated_total = Arc::new(AtomicU64::new(0));
        let mut tasks = Vec::with_capacity(lanes.len());

        for (topic, mut dispatcher, mut consumer) in lanes {
            let mut stop = stop_rx.clone();
            let stop_tx = stop_tx.clone();
            let pass_metrics = pass_metrics.clone();
            let task_topic = topic.clone();
            let integrated_total = integrated_total.clone();
            let max_clouds = self.config.max_clouds;

            let task = tokio::spawn(async move {
                let shutdown = async move {
                    let _ = stop.wait_for(|stopped| *stopped).await;
                };
                dispatcher
                    .run(&mut consumer, shutdown, |report| {
                        pass_metrics
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .update(
                                &topic,
                                &PassSample {
                                    integrated: report.integrated,
                                    dropped: report.dropped,
                                    deferred: report.deferred,
                                    queue_depth: report.queue_depth,
                                    integration_time: report.integration_time,
                                },
                            );

                        let integrated = report.integrated as u64;
                        let total = integrated_total.fetch_add(integrated, Ordering::Relaxed) + integrated;
                        if max_clouds.is_some_and(|max| total >= max) {
                            stop_tx.send_replace(true);
                        }
                    })
                    .await;

                let pending = consumer.len();
                let (stats, timer) = dispatcher.shutdown().await;
                InputRunStats {
                    topic,
                    stats,
                    timer,
                    pending,
                }
            });
            tasks.push((task_topic, task));
        }

        info!("Starting pointcloud sources...");
        ingestion.start_all();
        info!(
            inputs = ingestion.input_count(),
            sources = ingestion.source_count(),
            max_clouds = ?self.config.max_clouds,
            "Pipeline running (MOCK mode)"
        );

        let mut limit = stop_rx.clone();
        let timeout = self.config.timeout;
        tokio::select! {
            _ = shutdown => {
                warn!("Received shutdown signal, stopping pipeline...");
            }
            _ = sleep_or_forever(timeout) => {
                warn!(timeout_secs = timeout.map(|t| t.as_secs_f64()), "Pipeline timed out");
            }
            _ = limit.wait_for(|stopped| *stopped) => {
                info!(clouds = integrated_total.load(Ordering::Relaxed), "Reached max clouds limit");
            }
        }

        // Shutdown
        info!("Shutting down pipeline...");
        ingestion.stop_all();
        stop_tx.send_replace(true);

        let mut inputs = Vec::with_capacity(tasks.len());
        for (topic, task) in tasks {
            let input = task
                .await
                .map_err(|e| CliError::dispatcher_task(topic, e.to_string()))?;
            inputs.push(input);
        }
        let poses_published = match trajectory_task.await {
            Ok(published) => published,
            Err(e) => {
                warn!(error = %e, "Trajectory task failed");
                0
            }
        };

        let pass_metrics = pass_metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let stats = PipelineStats {
            duration: start_time.elapsed(),
            ingestion: ingestion.metrics().snapshot(),
            inputs,
            poses_published,
            pass_metrics,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            integrated = stats.clouds_integrated(),
            dropped = stats.clouds_dropped(),
            throughput = format!("{:.2}", stats.throughput()),
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}

/// Mock sensor matching an input's message format
fn mock_source(
    input: &PointcloudInputConfig,
    frame_id: &str,
    sim: &SimulationConfig,
    clock: MockClock,
) -> MockPointcloudSource {
    let source = match input.topic_type {
        PointcloudFormat::PointCloud2 => MockPointcloudSource::structured(
            &input.topic_name,
            frame_id,
            sim.cloud_rate_hz,
            sim.points_per_cloud,
        ),
        PointcloudFormat::Livox => MockPointcloudSource::livox(
            &input.topic_name,
            frame_id,
            sim.cloud_rate_hz,
            sim.points_per_cloud,
        ),
    };
    source
        .with_clock(clock)
        .with_scan_duration(Duration::from_secs_f64(sim.scan_duration_ms / 1e3))
}

/// Fresh integrator instances for one dispatcher, in configured order
fn register_integrators(dispatcher: &mut IntegrationDispatcher, configs: &[IntegratorConfig]) {
    if configs.is_empty() {
        warn!(
            topic = %dispatcher.config().topic,
            "No integrators configured - using a log integrator"
        );
        dispatcher.register_integrator(Box::new(LogIntegrator::new("log")));
        return;
    }
    for config in configs {
        dispatcher.register_integrator(create_integrator(config));
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(timeout) => tokio::time::sleep(timeout).await,
        None => std::future::pending().await,
    }
}
