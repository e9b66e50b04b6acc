//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置契约快照测试
//! - 模拟 e2e 测试：原始消息 -> 入队 -> 位姿解析/去畸变 -> 积分与调试输出

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DebugSinkType, IntegratorType, PointcloudFormat};

    #[test]
    fn test_input_defaults_from_minimal_config() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
world_frame = "odom"

[[inputs]]
topic_name = "/os_cloud_node/points"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let input = &blueprint.inputs[0];
        assert_eq!(input.topic_type, PointcloudFormat::PointCloud2);
        assert_eq!(input.topic_queue_length, 10);
        assert_eq!(input.processing_retry_period, 0.05);
        assert_eq!(input.max_wait_for_pose, 1.0);
        assert_eq!(input.time_offset, 0.0);
        assert!(!input.undistort_motion);
        assert!(input.sensor_frame_id.is_none());
        assert!(input.reprojected_pointcloud.is_none());
        assert!(input.projected_range_image.is_none());
        assert!(blueprint.integrators.is_empty());
    }

    #[test]
    fn test_full_config_round_trips_through_json() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
world_frame = "map"

[[inputs]]
topic_name = "livox/lidar"
topic_type = "livox"
undistort_motion = true
max_wait_for_pose = 0.25

[inputs.projected_range_image]
name = "ri_out"
sink_type = "file"
params = { base_path = "/tmp/ri" }

[[integrators]]
name = "projective"
integrator_type = "range_image"

[integrators.range_image]
width = 256
height = 32
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let json = ConfigLoader::to_json(&blueprint).unwrap();
        let reloaded = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();

        let input = &reloaded.inputs[0];
        assert_eq!(input.topic_type, PointcloudFormat::Livox);
        assert_eq!(input.max_wait_for_pose, 0.25);
        let output = input.projected_range_image.as_ref().unwrap();
        assert_eq!(output.sink_type, DebugSinkType::File);
        assert_eq!(output.params["base_path"], "/tmp/ri");

        let integrator = &reloaded.integrators[0];
        assert_eq!(integrator.integrator_type, IntegratorType::RangeImage);
        assert_eq!(integrator.range_image.width, 256);
        assert_eq!(integrator.range_image.max_range, 100.0);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        DebugOutputConfig, DebugSinkType, IntegratorConfig, IntegratorType, MessageHeader,
        PointcloudFormat, PointcloudInputConfig, RawPointcloudMsg, TimedPoint,
        TimedPointcloudMsg, Transformation3D,
    };
    use dispatcher::{create_integrator, DropReason, IntegrationDispatcher, LogIntegrator};
    use ingestion::{
        structured_msg_from_points, IngestionPipeline, MockClock, MockPointcloudSource, XyzPoint,
    };
    use tokio::sync::oneshot;
    use undistortion::TransformBuffer;

    const MS: u64 = 1_000_000;

    /// Livox-style message: `num_points` points spread evenly over `duration_ns`
    fn timed_msg(frame: &str, timebase: u64, duration_ns: u32, num_points: u32) -> RawPointcloudMsg {
        let step = duration_ns / num_points.saturating_sub(1).max(1);
        TimedPointcloudMsg {
            header: MessageHeader {
                stamp_ns: timebase,
                frame_id: frame.to_string(),
            },
            timebase,
            lidar_id: 0,
            points: (0..num_points)
                .map(|i| {
                    let angle = i as f32 * 0.1;
                    TimedPoint {
                        offset_time: (i * step).min(duration_ns),
                        x: 10.0 * angle.cos(),
                        y: 10.0 * angle.sin(),
                        z: 0.5,
                        reflectivity: 100,
                        tag: 0,
                        line: (i % 4) as u8,
                    }
                })
                .collect(),
        }
        .into()
    }

    /// Poses of `frame` in "odom" every 10 ms over `[from_ms, to_ms]`
    fn fill_poses(buffer: &TransformBuffer, frame: &str, from_ms: u64, to_ms: u64) {
        for t in (from_ms..=to_ms).step_by(10) {
            buffer.insert("odom", frame, t * MS, Transformation3D::translation(t as f32 * 0.01, 0.0, 0.0));
        }
    }

    fn file_output(name: &str, base_path: &std::path::Path) -> DebugOutputConfig {
        DebugOutputConfig {
            name: name.to_string(),
            sink_type: DebugSinkType::File,
            queue_capacity: 8,
            params: HashMap::from([(
                "base_path".to_string(),
                base_path.display().to_string(),
            )]),
        }
    }

    /// End-to-end: raw Livox message -> ingestion queue -> undistortion ->
    /// range image integrator -> file outputs for both debug channels
    #[tokio::test]
    async fn test_e2e_undistorted_cloud_to_range_image_and_files() {
        let output_dir = tempfile::tempdir().unwrap();

        let mut input = PointcloudInputConfig::new("livox/lidar", PointcloudFormat::Livox);
        input.undistort_motion = true;
        input.reprojected_pointcloud = Some(file_output("reprojected", output_dir.path()));
        input.projected_range_image = Some(file_output("range_image", output_dir.path()));

        let mut ingestion = IngestionPipeline::new();
        let mut consumer = ingestion.register_input(input.clone()).unwrap();
        let ingestor = ingestion.ingestor("livox/lidar").unwrap();

        let poses = Arc::new(TransformBuffer::new(100));
        fill_poses(&poses, "livox_frame", 0, 200);

        assert!(ingestor.on_message(timed_msg("livox_frame", 50 * MS, 50 * MS as u32, 64)));

        let mut dispatcher = IntegrationDispatcher::from_input(&input, "odom", poses)
            .await
            .unwrap();
        dispatcher.register_integrator(create_integrator(&IntegratorConfig {
            name: "projective".to_string(),
            integrator_type: IntegratorType::RangeImage,
            range_image: Default::default(),
        }));
        dispatcher.register_integrator(Box::new(LogIntegrator::new("log")));

        let report = dispatcher.process_queue(&mut consumer);
        assert_eq!(report.integrated, 1);
        assert_eq!(report.dropped, 0);
        assert_eq!(report.queue_depth, 0);

        let (stats, timer) = dispatcher.shutdown().await;
        assert_eq!(stats.integrated_clouds, 1);
        assert_eq!(stats.integrated_points, 64);
        assert_eq!(timer.episodes(), 1);

        let mut extensions: Vec<String> = std::fs::read_dir(output_dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .path()
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
            })
            .collect();
        extensions.sort();
        assert_eq!(extensions, vec!["ply".to_string(), "png".to_string()]);
    }

    /// A cloud whose end pose has not arrived yet is retried, then integrated
    /// once the pose shows up
    #[tokio::test]
    async fn test_e2e_waits_for_late_pose() {
        let mut input = PointcloudInputConfig::new("livox/lidar", PointcloudFormat::Livox);
        input.undistort_motion = true;

        let mut ingestion = IngestionPipeline::new();
        let mut consumer = ingestion.register_input(input.clone()).unwrap();
        let ingestor = ingestion.ingestor("livox/lidar").unwrap();

        let poses = Arc::new(TransformBuffer::new(100));
        fill_poses(&poses, "livox_frame", 0, 120);

        assert!(ingestor.on_message(timed_msg("livox_frame", 100 * MS, 50 * MS as u32, 32)));
        assert!(ingestor.on_message(timed_msg("livox_frame", 160 * MS, 50 * MS as u32, 32)));

        let mut dispatcher = IntegrationDispatcher::from_input(&input, "odom", poses.clone())
            .await
            .unwrap();
        dispatcher.register_integrator(Box::new(LogIntegrator::new("log")));

        let first = dispatcher.process_queue(&mut consumer);
        assert_eq!(first.integrated, 0);
        assert_eq!(first.dropped, 0);
        assert_eq!(first.deferred, 1);
        assert_eq!(first.queue_depth, 2);

        fill_poses(&poses, "livox_frame", 130, 160);
        let second = dispatcher.process_queue(&mut consumer);
        assert_eq!(second.integrated, 1);
        assert_eq!(second.deferred, 1);
        assert_eq!(second.queue_depth, 1);

        fill_poses(&poses, "livox_frame", 170, 220);
        let third = dispatcher.process_queue(&mut consumer);
        assert_eq!(third.integrated, 1);
        assert_eq!(third.queue_depth, 0);
        assert_eq!(dispatcher.stats().deferred_passes, 2);
    }

    /// A zero pose budget drops instead of waiting
    #[tokio::test]
    async fn test_e2e_zero_wait_budget_drops() {
        let mut input = PointcloudInputConfig::new("livox/lidar", PointcloudFormat::Livox);
        input.max_wait_for_pose = 0.0;

        let mut ingestion = IngestionPipeline::new();
        let mut consumer = ingestion.register_input(input.clone()).unwrap();
        let ingestor = ingestion.ingestor("livox/lidar").unwrap();

        let poses = Arc::new(TransformBuffer::new(100));
        fill_poses(&poses, "livox_frame", 0, 50);

        assert!(ingestor.on_message(timed_msg("livox_frame", 20 * MS, 10 * MS as u32, 8)));
        assert!(ingestor.on_message(timed_msg("livox_frame", 80 * MS, 10 * MS as u32, 8)));

        let mut dispatcher = IntegrationDispatcher::from_input(&input, "odom", poses)
            .await
            .unwrap();
        dispatcher.register_integrator(Box::new(LogIntegrator::new("log")));

        let report = dispatcher.process_queue(&mut consumer);
        assert_eq!(report.integrated, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(dispatcher.stats().dropped(DropReason::WaitExceeded), 1);
    }

    /// Rejected messages never reach the queue; the frame override decides
    /// which pose is looked up
    #[tokio::test]
    async fn test_e2e_rejections_and_frame_override() {
        let mut input = PointcloudInputConfig::new("points", PointcloudFormat::PointCloud2);
        input.sensor_frame_id = Some("base_lidar".to_string());
        input.time_offset = 0.01;

        let mut ingestion = IngestionPipeline::new();
        let mut consumer = ingestion.register_input(input.clone()).unwrap();
        let ingestor = ingestion.ingestor("points").unwrap();

        let header = MessageHeader {
            stamp_ns: 40 * MS,
            frame_id: "os_sensor".to_string(),
        };
        let empty = structured_msg_from_points(header.clone(), &[]);
        let cloud = structured_msg_from_points(
            header,
            &[XyzPoint::new(1.0, 0.0, 0.0), XyzPoint::new(0.0, 2.0, 0.0)],
        );

        let mut oversized = cloud.clone();
        oversized.height = 1 << 16;
        oversized.width = 1 << 16;

        assert!(!ingestor.on_message(empty.into()));
        assert!(!ingestor.on_message(timed_msg("os_sensor", 40 * MS, MS as u32, 4)));
        assert!(!ingestor.on_message(oversized.into()));
        assert!(ingestor.on_message(cloud.into()));

        let snapshot = ingestion.metrics().snapshot();
        assert_eq!(snapshot.messages_received, 4);
        assert_eq!(snapshot.messages_rejected, 3);
        assert_eq!(snapshot.clouds_enqueued, 1);
        assert_eq!(snapshot.points_enqueued, 2);

        let head = consumer.front().unwrap();
        assert_eq!(head.sensor_frame().as_str(), "base_lidar");
        assert_eq!(head.timebase(), 50 * MS);

        // Poses only exist for the overriding frame
        let poses = Arc::new(TransformBuffer::new(100));
        fill_poses(&poses, "base_lidar", 0, 100);

        let mut dispatcher = IntegrationDispatcher::from_input(&input, "odom", poses)
            .await
            .unwrap();
        dispatcher.register_integrator(Box::new(LogIntegrator::new("log")));
        let report = dispatcher.process_queue(&mut consumer);
        assert_eq!(report.integrated, 1);
        assert!(consumer.is_empty());
    }

    /// Live run: mock Livox sensor thread, a pose publisher task and the
    /// dispatcher loop, stopped through its shutdown future
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_live_mock_pipeline() {
        let mut input = PointcloudInputConfig::new("livox/lidar", PointcloudFormat::Livox);
        input.undistort_motion = true;
        input.processing_retry_period = 0.01;

        let clock = MockClock::new();
        let mut ingestion = IngestionPipeline::new();
        let mut consumer = ingestion.register_input(input.clone()).unwrap();
        ingestion
            .register_source(Box::new(
                MockPointcloudSource::livox("livox/lidar", "livox_frame", 50.0, 128)
                    .with_clock(clock)
                    .with_scan_duration(Duration::from_millis(10)),
            ))
            .unwrap();

        let poses = Arc::new(TransformBuffer::with_retention(1_000, 5_000 * MS));
        poses.insert("odom", "livox_frame", clock.now_ns(), Transformation3D::identity());
        let pose_writer = poses.clone();
        let (stop_poses, mut poses_stopped) = oneshot::channel::<()>();
        let pose_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(5));
            loop {
                tokio::select! {
                    _ = &mut poses_stopped => break,
                    _ = ticker.tick() => {
                        pose_writer.insert("odom", "livox_frame", clock.now_ns(), Transformation3D::identity());
                    }
                }
            }
        });

        let mut dispatcher = IntegrationDispatcher::from_input(&input, "odom", poses)
            .await
            .unwrap();
        dispatcher.register_integrator(Box::new(LogIntegrator::new("log")));

        ingestion.start_all();
        let mut passes = 0u64;
        dispatcher
            .run(&mut consumer, tokio::time::sleep(Duration::from_millis(400)), |_| {
                passes += 1
            })
            .await;
        ingestion.stop_all();
        let _ = stop_poses.send(());
        pose_task.await.unwrap();

        let (stats, _) = dispatcher.shutdown().await;
        let snapshot = ingestion.metrics().snapshot();
        assert!(passes > 0);
        assert!(snapshot.clouds_enqueued > 0);
        assert!(
            stats.integrated_clouds >= 3,
            "expected at least 3 integrated clouds, got {}",
            stats.integrated_clouds
        );
        assert_eq!(stats.total_dropped(), 0);
    }
}
