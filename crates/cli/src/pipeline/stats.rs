//! Pipeline statistics and metrics.

use std::time::Duration;

use dispatcher::{DispatcherStats, DropReason, IntegrationTimer};
use ingestion::MetricsSnapshot;
use observability::PipelineMetricsAggregator;

/// Final counters of one input
#[derive(Debug, Clone)]
pub struct InputRunStats {
    pub topic: String,
    pub stats: DispatcherStats,
    pub timer: IntegrationTimer,
    /// Clouds still queued at shutdown
    pub pending: usize,
}

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Ingestion counters across all inputs
    pub ingestion: MetricsSnapshot,

    /// Per-input dispatcher results
    pub inputs: Vec<InputRunStats>,

    /// Trajectory ticks published into the transform buffer
    pub poses_published: u64,

    /// Per-pass aggregates
    pub pass_metrics: PipelineMetricsAggregator,
}

impl PipelineStats {
    pub fn clouds_integrated(&self) -> u64 {
        self.inputs.iter().map(|i| i.stats.integrated_clouds).sum()
    }

    pub fn clouds_dropped(&self) -> u64 {
        self.inputs.iter().map(|i| i.stats.total_dropped()).sum()
    }

    /// Integrated clouds per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.clouds_integrated() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");

        println!("Overview");
        println!("   Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   Messages received: {} (rejected {})",
            self.ingestion.messages_received, self.ingestion.messages_rejected
        );
        println!(
            "   Clouds enqueued: {} ({} points)",
            self.ingestion.clouds_enqueued, self.ingestion.points_enqueued
        );
        println!("   Clouds integrated: {}", self.clouds_integrated());
        println!("   Clouds dropped: {}", self.clouds_dropped());
        println!("   Throughput: {:.2} clouds/s", self.throughput());
        println!("   Trajectory ticks: {}", self.poses_published);

        for input in &self.inputs {
            println!("\nInput {}", input.topic);
            println!(
                "   Integrated: {} clouds, {} points",
                input.stats.integrated_clouds, input.stats.integrated_points
            );
            println!(
                "   Integration time: total {:.3}s, mean {:.3}ms",
                input.timer.total().as_secs_f64(),
                input.timer.mean().as_secs_f64() * 1e3
            );
            println!("   Deferred passes: {}", input.stats.deferred_passes);
            println!("   Pending at shutdown: {}", input.pending);
            for reason in DropReason::ALL {
                let count = input.stats.dropped(reason);
                if count > 0 {
                    println!("   Dropped ({reason}): {count}");
                }
            }
        }

        println!("\n{}", self.pass_metrics.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(topic: &str, integrated: u64, dropped: &[DropReason]) -> InputRunStats {
        let mut stats = DispatcherStats::default();
        stats.integrated_clouds = integrated;
        for reason in dropped {
            stats.record_drop(*reason);
        }
        InputRunStats {
            topic: topic.to_string(),
            stats,
            timer: IntegrationTimer::default(),
            pending: 0,
        }
    }

    #[test]
    fn test_totals_across_inputs() {
        let stats = PipelineStats {
            duration: Duration::from_secs(2),
            inputs: vec![
                input("a", 10, &[DropReason::WaitExceeded]),
                input("b", 6, &[DropReason::StartTimeEvicted, DropReason::PoseUnavailable]),
            ],
            ..Default::default()
        };
        assert_eq!(stats.clouds_integrated(), 16);
        assert_eq!(stats.clouds_dropped(), 3);
        assert!((stats.throughput() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_duration_throughput() {
        assert_eq!(PipelineStats::default().throughput(), 0.0);
    }
}
