//! Delivery metrics
//!
//! Prometheus-facing recording helpers for the I/O dispatcher, plus an
//! in-memory aggregator used for run summaries.

use std::collections::HashMap;

use metrics::{counter, gauge, histogram};

/// Record the final outcome of one batch
///
/// `status` is one of `success`, `failure`, `config_error`.
pub fn record_batch_completed(project: &str, status: &str) {
    counter!(
        "log_producer_batches_total",
        "project" => project.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record the number of write attempts spent on one batch
pub fn record_send_attempts(project: &str, attempts: u32) {
    counter!(
        "log_producer_send_attempts_total",
        "project" => project.to_string()
    )
    .increment(u64::from(attempts));
}

/// Record a batch pushed back to the queue after a pool rejection
pub fn record_batch_requeued() {
    counter!("log_producer_batches_requeued_total").increment(1);
}

/// Record the current dispatch queue depth
pub fn record_queue_depth(depth: usize) {
    gauge!("log_producer_queue_depth").set(depth as f64);
}

/// Record the observed outflow (bytes per second over the current window)
pub fn record_outflow(bytes_per_sec: f64) {
    gauge!("log_producer_outflow_bytes_per_sec").set(bytes_per_sec);
}

/// Record time between enqueue and dispatch
pub fn record_queue_latency_ms(latency_ms: f64) {
    histogram!("log_producer_queue_latency_ms").record(latency_ms);
}

/// Outcome of one batch as seen by its callback
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub error_code: Option<String>,
    pub outflow: f64,
    pub elapsed_ms: Option<f64>,
}

/// Delivery aggregator
///
/// Aggregates callback outcomes in memory for summaries.
#[derive(Debug, Clone, Default)]
pub struct DeliveryMetricsAggregator {
    /// Batches delivered
    pub total_succeeded: u64,

    /// Batches that ended with an error
    pub total_failed: u64,

    /// Failure counts by error code
    pub error_counts: HashMap<String, u64>,

    /// Reported outflow
    pub outflow_stats: RunningStats,

    /// Submit-to-callback latency
    pub latency_stats: RunningStats,
}

impl DeliveryMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with one callback outcome
    pub fn update(&mut self, outcome: &DeliveryOutcome) {
        if outcome.success {
            self.total_succeeded += 1;
        } else {
            self.total_failed += 1;
            let code = outcome.error_code.as_deref().unwrap_or("Unknown");
            *self.error_counts.entry(code.to_string()).or_insert(0) += 1;
        }

        self.outflow_stats.push(outcome.outflow);

        if let Some(elapsed) = outcome.elapsed_ms {
            self.latency_stats.push(elapsed);
        }
    }

    pub fn total(&self) -> u64 {
        self.total_succeeded + self.total_failed
    }

    /// Build a summary report
    pub fn summary(&self) -> MetricsSummary {
        let total = self.total();
        MetricsSummary {
            total_batches: total,
            total_succeeded: self.total_succeeded,
            total_failed: self.total_failed,
            failure_rate: if total > 0 {
                self.total_failed as f64 / total as f64 * 100.0
            } else {
                0.0
            },
            outflow_bytes_per_sec: StatsSummary::from(&self.outflow_stats),
            latency_ms: StatsSummary::from(&self.latency_stats),
            error_counts: self.error_counts.clone(),
        }
    }
}

/// Metrics summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_batches: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub failure_rate: f64,
    pub outflow_bytes_per_sec: StatsSummary,
    pub latency_ms: StatsSummary,
    pub error_counts: HashMap<String, u64>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Delivery Summary ===")?;
        writeln!(f, "Total batches: {}", self.total_batches)?;
        writeln!(f, "Succeeded: {}", self.total_succeeded)?;
        writeln!(
            f,
            "Failed: {} ({:.2}%)",
            self.total_failed, self.failure_rate
        )?;
        writeln!(f, "Outflow (bytes/s): {}", self.outflow_bytes_per_sec)?;
        writeln!(f, "Latency (ms): {}", self.latency_ms)?;

        if !self.error_counts.is_empty() {
            writeln!(f, "Errors by code:")?;
            for (code, count) in &self.error_counts {
                writeln!(f, "  {}: {}", code, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
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

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
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

    /// Sample variance
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = DeliveryMetricsAggregator::new();

        aggregator.update(&DeliveryOutcome {
            success: true,
            error_code: None,
            outflow: 2048.0,
            elapsed_ms: Some(12.0),
        });
        aggregator.update(&DeliveryOutcome {
            success: false,
            error_code: Some("ProjectConfigNotExist".to_string()),
            outflow: 0.0,
            elapsed_ms: None,
        });

        assert_eq!(aggregator.total(), 2);
        assert_eq!(aggregator.total_succeeded, 1);
        assert_eq!(aggregator.error_counts.get("ProjectConfigNotExist"), Some(&1));
        assert_eq!(aggregator.latency_stats.count(), 1);

        let summary = aggregator.summary();
        assert!((summary.failure_rate - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let summary = MetricsSummary {
            total_batches: 100,
            total_succeeded: 95,
            total_failed: 5,
            failure_rate: 5.0,
            outflow_bytes_per_sec: StatsSummary {
                count: 100,
                min: 10.0,
                max: 80.0,
                mean: 50.0,
                std_dev: 15.0,
            },
            latency_ms: StatsSummary::default(),
            error_counts: HashMap::new(),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Total batches: 100"));
        assert!(output.contains("5.00%"));
        assert!(output.contains("Latency (ms): N/A"));
    }
}
