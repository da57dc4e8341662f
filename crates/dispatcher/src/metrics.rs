//! Dispatch metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Counters shared by the dispatch loop and the workers
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Last observed queue depth
    queue_len: AtomicUsize,
    /// Batches accepted by `submit`
    submitted_count: AtomicU64,
    /// Batches delivered
    success_count: AtomicU64,
    /// Batches that exhausted their retries
    failure_count: AtomicU64,
    /// Batches whose project had no client
    config_error_count: AtomicU64,
    /// Write attempts (including retries)
    attempt_count: AtomicU64,
    /// Pool rejections turned into re-enqueues
    requeued_count: AtomicU64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn submitted_count(&self) -> u64 {
        self.submitted_count.load(Ordering::Relaxed)
    }

    pub fn inc_submitted_count(&self) {
        self.submitted_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    pub fn inc_success_count(&self) {
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn config_error_count(&self) -> u64 {
        self.config_error_count.load(Ordering::Relaxed)
    }

    pub fn inc_config_error_count(&self) {
        self.config_error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempt_count(&self) -> u64 {
        self.attempt_count.load(Ordering::Relaxed)
    }

    pub fn add_attempts(&self, attempts: u32) {
        self.attempt_count
            .fetch_add(u64::from(attempts), Ordering::Relaxed);
    }

    pub fn requeued_count(&self) -> u64 {
        self.requeued_count.load(Ordering::Relaxed)
    }

    pub fn inc_requeued_count(&self) {
        self.requeued_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Batches that received their callback
    pub fn completed_count(&self) -> u64 {
        self.success_count() + self.failure_count() + self.config_error_count()
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            submitted_count: self.submitted_count(),
            success_count: self.success_count(),
            failure_count: self.failure_count(),
            config_error_count: self.config_error_count(),
            attempt_count: self.attempt_count(),
            requeued_count: self.requeued_count(),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub submitted_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub config_error_count: u64,
    pub attempt_count: u64,
    pub requeued_count: u64,
}

impl MetricsSnapshot {
    pub fn completed_count(&self) -> u64 {
        self.success_count + self.failure_count + self.config_error_count
    }
}
