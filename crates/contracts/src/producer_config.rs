//! Producer configuration contracts shared across crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::LogsFormat;

/// I/O dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProducerConfig {
    /// Maximum number of concurrent I/O workers
    #[serde(default = "default_max_io_workers")]
    #[validate(range(min = 1, message = "max_io_workers must be >= 1"))]
    pub max_io_workers: usize,

    /// Per-batch timeout in milliseconds; the dispatcher polls with half of it
    #[serde(default = "default_package_timeout_ms")]
    #[validate(range(min = 2, message = "package_timeout_ms must be >= 2"))]
    pub package_timeout_ms: u64,

    /// Extra attempts after the first failed write
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    /// Wire encoding of write requests
    #[serde(default)]
    pub logs_format: LogsFormat,

    /// Idle I/O workers are retired after this many milliseconds
    #[serde(default = "default_io_worker_idle_timeout_ms")]
    #[validate(range(min = 1, message = "io_worker_idle_timeout_ms must be >= 1"))]
    pub io_worker_idle_timeout_ms: u64,

    /// Capacity of the upstream byte budget
    #[serde(default = "default_total_size_in_bytes")]
    #[validate(range(min = 1, message = "total_size_in_bytes must be >= 1"))]
    pub total_size_in_bytes: usize,
}

fn default_max_io_workers() -> usize {
    50
}

fn default_package_timeout_ms() -> u64 {
    3000
}

fn default_retry_times() -> u32 {
    3
}

fn default_io_worker_idle_timeout_ms() -> u64 {
    60_000
}

fn default_total_size_in_bytes() -> usize {
    100 * 1024 * 1024
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            max_io_workers: default_max_io_workers(),
            package_timeout_ms: default_package_timeout_ms(),
            retry_times: default_retry_times(),
            logs_format: LogsFormat::default(),
            io_worker_idle_timeout_ms: default_io_worker_idle_timeout_ms(),
            total_size_in_bytes: default_total_size_in_bytes(),
        }
    }
}

impl ProducerConfig {
    /// Queue poll timeout: half the per-batch timeout
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.package_timeout_ms / 2)
    }

    pub fn io_worker_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.io_worker_idle_timeout_ms)
    }

    /// Total write attempts per batch
    pub fn max_attempts(&self) -> u32 {
        self.retry_times.saturating_add(1)
    }
}
