//! Mock 点云源
//!
//! 用于无真实激光雷达的测试与演示：在独立线程中按固定频率生成一圈扫描。

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use contracts::{
    MessageHeader, PointcloudCallback, PointcloudFormat, PointcloudSource, RawPointcloudMsg,
    TimedPoint, TimedPointcloudMsg,
};
use rand::Rng;
use tracing::{debug, trace};

use crate::adapters::{structured_msg_from_points, XyzPoint};

/// Mock 传感器与模拟位姿共用的纳秒时钟
#[derive(Debug, Clone, Copy)]
pub struct MockClock {
    origin: Instant,
    epoch_ns: u64,
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClock {
    /// 以当前系统时间为起点
    pub fn new() -> Self {
        let epoch_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self {
            origin: Instant::now(),
            epoch_ns,
        }
    }

    /// 当前时间 (纳秒)
    pub fn now_ns(&self) -> u64 {
        self.epoch_ns + self.origin.elapsed().as_nanos() as u64
    }
}

/// Mock 点云源配置
#[derive(Debug, Clone)]
pub struct MockPointcloudConfig {
    /// 发布的 topic
    pub topic: String,

    /// 消息格式
    pub format: PointcloudFormat,

    /// 消息头中的坐标系
    pub frame_id: String,

    /// 发送频率 (Hz)
    pub frequency_hz: f64,

    /// 每帧点数
    pub points_per_cloud: u32,

    /// 单帧扫描时长 (纳秒)
    pub scan_duration_ns: u32,

    /// 扫描线数
    pub lines: u8,

    /// 模拟墙面距离 (米)
    pub range_m: f32,
}

impl Default for MockPointcloudConfig {
    fn default() -> Self {
        Self {
            topic: "mock/points".to_string(),
            format: PointcloudFormat::PointCloud2,
            frame_id: "mock_lidar".to_string(),
            frequency_hz: 10.0,
            points_per_cloud: 2048,
            scan_duration_ns: 100_000_000,
            lines: 16,
            range_m: 8.0,
        }
    }
}

/// Mock 点云源
pub struct MockPointcloudSource {
    config: MockPointcloudConfig,
    clock: MockClock,
    running: Arc<AtomicBool>,
}

impl MockPointcloudSource {
    pub fn new(config: MockPointcloudConfig) -> Self {
        Self {
            config,
            clock: MockClock::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 创建 PointCloud2 风格的 Mock 源
    pub fn structured(topic: &str, frame_id: &str, frequency_hz: f64, num_points: u32) -> Self {
        Self::new(MockPointcloudConfig {
            topic: topic.to_string(),
            format: PointcloudFormat::PointCloud2,
            frame_id: frame_id.to_string(),
            frequency_hz,
            points_per_cloud: num_points,
            ..Default::default()
        })
    }

    /// 创建 Livox 风格 (逐点时间戳) 的 Mock 源
    pub fn livox(topic: &str, frame_id: &str, frequency_hz: f64, num_points: u32) -> Self {
        Self::new(MockPointcloudConfig {
            topic: topic.to_string(),
            format: PointcloudFormat::Livox,
            frame_id: frame_id.to_string(),
            frequency_hz,
            points_per_cloud: num_points,
            ..Default::default()
        })
    }

    /// 与模拟轨迹共用同一时钟
    pub fn with_clock(mut self, clock: MockClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scan_duration(mut self, scan_duration: Duration) -> Self {
        self.config.scan_duration_ns = scan_duration.as_nanos().min(u32::MAX as u128) as u32;
        self
    }

    pub fn config(&self) -> &MockPointcloudConfig {
        &self.config
    }

    /// 生成一帧扫描，`end_ns` 为最后一个点的采集时间
    pub fn generate(config: &MockPointcloudConfig, end_ns: u64) -> RawPointcloudMsg {
        let n = config.points_per_cloud.max(1);
        let lines = config.lines.max(1);
        let start_ns = end_ns.saturating_sub(u64::from(config.scan_duration_ns));
        let mut rng = rand::rng();

        let points: Vec<(XyzPoint, u32, u8)> = (0..n)
            .map(|i| {
                let line = (i % u32::from(lines)) as u8;
                let azimuth = 2.0 * PI * i as f32 / n as f32;
                let elevation = if lines > 1 {
                    (-15.0 + 30.0 * f32::from(line) / f32::from(lines - 1)).to_radians()
                } else {
                    0.0
                };
                let range = config.range_m + rng.random_range(-0.02..0.02);
                let point = XyzPoint::new(
                    range * elevation.cos() * azimuth.cos(),
                    range * elevation.cos() * azimuth.sin(),
                    range * elevation.sin(),
                );
                let offset = (u64::from(config.scan_duration_ns) * u64::from(i) / u64::from(n)) as u32;
                (point, offset, line)
            })
            .collect();

        match config.format {
            PointcloudFormat::PointCloud2 => {
                let xyz: Vec<XyzPoint> = points.iter().map(|(p, _, _)| *p).collect();
                structured_msg_from_points(
                    MessageHeader {
                        stamp_ns: start_ns,
                        frame_id: config.frame_id.clone(),
                    },
                    &xyz,
                )
                .into()
            }
            PointcloudFormat::Livox => TimedPointcloudMsg {
                header: MessageHeader {
                    stamp_ns: end_ns,
                    frame_id: config.frame_id.clone(),
                },
                timebase: start_ns,
                lidar_id: 0,
                points: points
                    .into_iter()
                    .map(|(p, offset_time, line)| TimedPoint {
                        offset_time,
                        x: p.x,
                        y: p.y,
                        z: p.z,
                        reflectivity: 100,
                        tag: 0,
                        line,
                    })
                    .collect(),
            }
            .into(),
        }
    }
}

impl PointcloudSource for MockPointcloudSource {
    fn topic(&self) -> &str {
        &self.config.topic
    }

    fn format(&self) -> PointcloudFormat {
        self.config.format
    }

    fn listen(&self, callback: PointcloudCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let clock = self.clock;
        let running = self.running.clone();

        std::thread::spawn(move || {
            let interval = Duration::from_secs_f64(1.0 / config.frequency_hz.max(f64::EPSILON));
            let mut seq: u64 = 0;

            debug!(
                topic = %config.topic,
                format = %config.format,
                frequency_hz = config.frequency_hz,
                "mock pointcloud source started"
            );

            while running.load(Ordering::Relaxed) {
                std::thread::sleep(interval);
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                seq += 1;
                let end_ns = clock.now_ns();
                callback(Self::generate(&config, end_ns));
                trace!(topic = %config.topic, seq, end_ns, "mock pointcloud sent");
            }

            debug!(topic = %config.topic, "mock pointcloud source stopped");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_generated_livox_scan() {
        let source = MockPointcloudSource::livox("livox/lidar", "livox_frame", 10.0, 64)
            .with_scan_duration(Duration::from_millis(50));
        let msg = MockPointcloudSource::generate(source.config(), 1_000_000_000);

        let RawPointcloudMsg::Timed(timed) = msg else {
            panic!("expected timed message");
        };
        assert_eq!(timed.points.len(), 64);
        assert_eq!(timed.timebase, 950_000_000);
        assert_eq!(timed.points[0].offset_time, 0);
        assert!(timed.points.windows(2).all(|w| w[0].offset_time <= w[1].offset_time));
        assert!(timed.points.iter().all(|p| p.offset_time < 50_000_000));
    }

    #[test]
    fn test_generated_structured_scan() {
        let source = MockPointcloudSource::structured("points", "os_sensor", 10.0, 32);
        let msg = MockPointcloudSource::generate(source.config(), 500_000_000);
        assert_eq!(msg.format(), PointcloudFormat::PointCloud2);
        assert_eq!(msg.header().stamp_ns, 400_000_000);
        assert_eq!(msg.header().frame_id, "os_sensor");
    }

    #[test]
    fn test_mock_source_delivers_from_thread() {
        let source = MockPointcloudSource::structured("points", "os_sensor", 200.0, 8);
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();

        source.listen(Arc::new(move |msg: RawPointcloudMsg| sink.lock().unwrap().push(msg)));
        assert!(source.is_listening());
        std::thread::sleep(Duration::from_millis(100));
        source.stop();
        assert!(!source.is_listening());

        let received = received.lock().unwrap();
        assert!(!received.is_empty());
        assert!(received
            .windows(2)
            .all(|w| w[0].header().stamp_ns <= w[1].header().stamp_ns));
    }
}
