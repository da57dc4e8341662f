//! ThroughputWindow - approximate recent outflow
//!
//! Two independent atomics: bytes sent since the window started and the
//! window start (milliseconds since the window's origin). Byte updates use
//! a single `fetch_add`; the reset is a plain load-then-store, so two
//! concurrent resets may both fire and a `record` racing a reset may be
//! lost. The figure is an observability signal only.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Window length after which the counters restart
pub const THROUGHPUT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct ThroughputWindow {
    origin: Instant,
    span: Duration,
    window_start_ms: AtomicU64,
    bytes: AtomicU64,
}

impl Default for ThroughputWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputWindow {
    pub fn new() -> Self {
        Self::with_span(THROUGHPUT_WINDOW)
    }

    pub fn with_span(span: Duration) -> Self {
        Self {
            origin: Instant::now(),
            span,
            window_start_ms: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    fn millis_at(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.origin).as_millis() as u64
    }

    /// Restart the window if more than `span` elapsed since it started
    pub fn reset_if_expired(&self) -> bool {
        self.reset_if_expired_at(Instant::now())
    }

    pub fn reset_if_expired_at(&self, now: Instant) -> bool {
        let now_ms = self.millis_at(now);
        let start_ms = self.window_start_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(start_ms) > self.span.as_millis() as u64 {
            self.bytes.store(0, Ordering::Relaxed);
            self.window_start_ms.store(now_ms, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Account for a successfully sent batch
    pub fn record(&self, bytes: usize) {
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Bytes per second since the window started, 0 if no time elapsed
    pub fn outflow(&self) -> f64 {
        self.outflow_at(Instant::now())
    }

    pub fn outflow_at(&self, now: Instant) -> f64 {
        let start_ms = self.window_start_ms.load(Ordering::Relaxed);
        let elapsed_ms = self.millis_at(now).saturating_sub(start_ms);
        if elapsed_ms == 0 {
            return 0.0;
        }
        self.bytes() as f64 / (elapsed_ms as f64 / 1000.0)
    }
}
