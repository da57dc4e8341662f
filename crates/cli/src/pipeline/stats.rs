//! Run statistics.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::DeliveryMetricsAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Batches handed to the dispatcher
    pub submitted: u64,

    pub bytes_submitted: u64,

    /// Callback outcomes
    pub delivery: DeliveryMetricsAggregator,

    /// Dispatcher counters at the end of the run
    pub dispatch: MetricsSnapshot,

    /// Budget still held after shutdown (0 when every batch was released)
    pub budget_in_use: usize,

    pub duration: Duration,

    pub timed_out: bool,

    /// Stopped by a shutdown signal
    pub interrupted: bool,

    /// Submission stopped on a batch larger than the whole byte budget
    pub budget_rejection: Option<String>,
}

impl PipelineStats {
    /// Batches whose callback fired
    pub fn resolved(&self) -> u64 {
        self.delivery.total()
    }

    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.resolved())
    }

    pub fn batches_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.resolved() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Submitted: {} batches, {} bytes", self.submitted, self.bytes_submitted);
        println!("Resolved: {} ({:.2} batches/s)", self.resolved(), self.batches_per_sec());
        println!("Pending: {}", self.pending());
        if self.timed_out {
            println!("Timed out before all callbacks fired");
        }
        if self.interrupted {
            println!("Interrupted by shutdown signal");
        }
        if let Some(ref rejection) = self.budget_rejection {
            println!("Submission stopped: {rejection}");
        }

        println!("\nDispatcher:");
        println!("  Write attempts: {}", self.dispatch.attempt_count);
        println!("  Re-queued on saturation: {}", self.dispatch.requeued_count);
        println!("  Config errors: {}", self.dispatch.config_error_count);
        println!("  Budget in use: {} bytes", self.budget_in_use);

        println!("\n{}", self.delivery.summary());
    }
}
