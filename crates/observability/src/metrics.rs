//! 点云管道指标收集模块
//!
//! Prometheus 指标记录函数，以及 CLI 用于输出运行摘要的内存聚合器。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::PointcloudFormat;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// 注册指标描述
///
/// 在安装 recorder 之后调用一次。
pub fn describe_metrics() {
    describe_counter!(
        "pointcloud_received_total",
        "Point cloud messages delivered by the transport"
    );
    describe_counter!(
        "pointcloud_rejected_total",
        "Messages rejected during ingestion, by reason"
    );
    describe_counter!("pointcloud_enqueued_total", "Clouds pushed to the ingestion queue");
    describe_counter!(
        "pointcloud_integrated_total",
        "Clouds handed to the map integrators"
    );
    describe_counter!("pointcloud_dropped_total", "Clouds dropped by the dispatcher, by reason");
    describe_counter!(
        "pointcloud_deferred_total",
        "Drain passes stopped at a cloud waiting for its pose"
    );
    describe_gauge!("pointcloud_queue_depth", "Clouds waiting in the ingestion queue");
    describe_histogram!(
        "pointcloud_integration_seconds",
        "Wall time spent in the integrators per cloud"
    );
    describe_counter!(
        "pointcloud_debug_published_total",
        "Debug messages offered to a debug output, by status"
    );
}

/// 记录传输层送达的消息
pub fn record_pointcloud_received(topic: &str, format: PointcloudFormat) {
    counter!(
        "pointcloud_received_total",
        "topic" => topic.to_string(),
        "format" => format.to_string()
    )
    .increment(1);
}

/// 记录被拒绝的消息
pub fn record_pointcloud_rejected(topic: &str, reason: &'static str) {
    counter!(
        "pointcloud_rejected_total",
        "topic" => topic.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录入队
pub fn record_pointcloud_enqueued(topic: &str, points: usize) {
    counter!("pointcloud_enqueued_total", "topic" => topic.to_string()).increment(1);
    histogram!("pointcloud_points_per_cloud", "topic" => topic.to_string()).record(points as f64);
}

/// 记录一次积分
pub fn record_pointcloud_integrated(topic: &str, elapsed: Duration) {
    counter!("pointcloud_integrated_total", "topic" => topic.to_string()).increment(1);
    histogram!("pointcloud_integration_seconds", "topic" => topic.to_string())
        .record(elapsed.as_secs_f64());
}

/// 记录丢弃
pub fn record_pointcloud_dropped(topic: &str, reason: &'static str) {
    counter!(
        "pointcloud_dropped_total",
        "topic" => topic.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// 记录因等待位姿而中止的处理轮次
pub fn record_queue_deferred(topic: &str) {
    counter!("pointcloud_deferred_total", "topic" => topic.to_string()).increment(1);
}

/// 记录队列深度
pub fn record_queue_depth(topic: &str, depth: usize) {
    gauge!("pointcloud_queue_depth", "topic" => topic.to_string()).set(depth as f64);
}

/// 记录调试输出
pub fn record_debug_published(sink_name: &str, accepted: bool) {
    let status = if accepted { "accepted" } else { "dropped" };
    counter!(
        "pointcloud_debug_published_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 单轮队列处理的结果
#[derive(Debug, Clone, Copy, Default)]
pub struct PassSample {
    pub integrated: usize,
    pub dropped: usize,
    pub deferred: bool,
    /// 本轮结束时的队列长度
    pub queue_depth: usize,
    /// 本轮在积分器中花费的时间
    pub integration_time: Duration,
}

/// 单个输入的累计统计
#[derive(Debug, Clone, Default)]
pub struct TopicAggregate {
    pub passes: u64,
    pub deferred_passes: u64,
    pub integrated: u64,
    pub dropped: u64,
    /// 每轮结束时的队列长度
    pub queue_depth: RunningStats,
    /// 每朵点云的积分耗时 (毫秒)
    pub integration_ms: RunningStats,
}

/// 管道指标聚合器
///
/// 在内存中按 topic 聚合，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct PipelineMetricsAggregator {
    topics: BTreeMap<String, TopicAggregate>,
}

impl PipelineMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新一轮处理结果
    pub fn update(&mut self, topic: &str, sample: &PassSample) {
        let entry = self.topics.entry(topic.to_string()).or_default();
        entry.passes += 1;
        entry.integrated += sample.integrated as u64;
        entry.dropped += sample.dropped as u64;
        if sample.deferred {
            entry.deferred_passes += 1;
        }
        entry.queue_depth.push(sample.queue_depth as f64);
        if sample.integrated > 0 {
            let per_cloud = sample.integration_time.as_secs_f64() * 1e3 / sample.integrated as f64;
            entry.integration_ms.push(per_cloud);
        }
    }

    pub fn topic(&self, topic: &str) -> Option<&TopicAggregate> {
        self.topics.get(topic)
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        let topics = self
            .topics
            .iter()
            .map(|(name, agg)| TopicSummary {
                topic: name.clone(),
                integrated: agg.integrated,
                dropped: agg.dropped,
                passes: agg.passes,
                deferred_passes: agg.deferred_passes,
                drop_rate: percentage(agg.dropped, agg.integrated + agg.dropped),
                queue_depth: StatsSummary::from(&agg.queue_depth),
                integration_ms: StatsSummary::from(&agg.integration_ms),
            })
            .collect();
        MetricsSummary { topics }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// 单个输入的摘要
#[derive(Debug, Clone, Default)]
pub struct TopicSummary {
    pub topic: String,
    pub integrated: u64,
    pub dropped: u64,
    pub passes: u64,
    pub deferred_passes: u64,
    pub drop_rate: f64,
    pub queue_depth: StatsSummary,
    pub integration_ms: StatsSummary,
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub topics: Vec<TopicSummary>,
}

impl MetricsSummary {
    pub fn total_integrated(&self) -> u64 {
        self.topics.iter().map(|t| t.integrated).sum()
    }

    pub fn total_dropped(&self) -> u64 {
        self.topics.iter().map(|t| t.dropped).sum()
    }
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Pointcloud Pipeline Summary ===")?;
        for topic in &self.topics {
            writeln!(f, "[{}]", topic.topic)?;
            writeln!(
                f,
                "  Integrated: {}, dropped: {} ({:.2}%)",
                topic.integrated, topic.dropped, topic.drop_rate
            )?;
            writeln!(
                f,
                "  Passes: {} ({} waiting for pose)",
                topic.passes, topic.deferred_passes
            )?;
            writeln!(f, "  Queue depth: {}", topic.queue_depth)?;
            writeln!(f, "  Integration (ms/cloud): {}", topic.integration_ms)?;
        }
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
