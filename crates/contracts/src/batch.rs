//! PendingBatch - the unit of delivery handed to the I/O dispatcher
//!
//! A batch owns its records and a one-shot completion callback. The
//! dispatcher consumes the batch when it fires the callback, so no
//! further access is possible afterwards.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::{ContractError, LogItem, PutLogsResponse};

/// Completion callback: `(response, error, outflow_bytes_per_sec)`
pub type BatchCallback =
    Box<dyn FnOnce(Option<PutLogsResponse>, Option<ContractError>, f64) + Send + 'static>;

static PACKAGE_COUNTER: AtomicU64 = AtomicU64::new(0);
static PACKAGE_PREFIX: OnceLock<String> = OnceLock::new();

/// Generate a process-unique batch id: `<prefix>-<counter>`
fn next_package_id() -> String {
    let prefix = PACKAGE_PREFIX.get_or_init(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        format!("{:X}", nanos ^ u64::from(std::process::id()).rotate_left(32))
    });
    let seq = PACKAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{seq:X}")
}

/// Timing marks recorded while the batch moves through the dispatcher
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchTimings {
    pub enqueue_begin: Option<Instant>,
    pub enqueue_end: Option<Instant>,
    pub dispatch_begin: Option<Instant>,
    /// Queue depth observed when the batch left the queue
    pub queue_depth_at_dispatch: Option<usize>,
}

impl BatchTimings {
    /// Time spent waiting in the queue, if both marks are set
    pub fn queue_latency(&self) -> Option<std::time::Duration> {
        match (self.enqueue_end, self.dispatch_begin) {
            (Some(end), Some(begin)) => Some(begin.saturating_duration_since(end)),
            _ => None,
        }
    }
}

/// A batch of log records bound for one project/logstore
pub struct PendingBatch {
    pub project: String,
    pub logstore: String,
    pub topic: String,
    pub source: String,
    pub items: Vec<LogItem>,
    /// Optional routing hint
    pub shard_hash: Option<String>,
    package_id: String,
    timings: BatchTimings,
    /// Locked only on completion; keeps the batch `Sync` so it can be
    /// borrowed across a write
    callback: Mutex<Option<BatchCallback>>,
}

impl PendingBatch {
    /// Start building a batch
    pub fn builder(project: impl Into<String>, logstore: impl Into<String>) -> PendingBatchBuilder {
        PendingBatchBuilder {
            project: project.into(),
            logstore: logstore.into(),
            topic: String::new(),
            source: String::new(),
            items: Vec::new(),
            shard_hash: None,
            callback: None,
        }
    }

    /// Unique id, stable for the batch lifetime
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    pub fn timings(&self) -> &BatchTimings {
        &self.timings
    }

    pub fn mark_enqueue_begin(&mut self) {
        self.timings.enqueue_begin = Some(Instant::now());
    }

    pub fn mark_enqueue_end(&mut self) {
        self.timings.enqueue_end = Some(Instant::now());
    }

    pub fn mark_dispatch_begin(&mut self, queue_depth: usize) {
        self.timings.dispatch_begin = Some(Instant::now());
        self.timings.queue_depth_at_dispatch = Some(queue_depth);
    }

    /// Fire the completion callback and consume the batch
    pub fn complete(
        self,
        response: Option<PutLogsResponse>,
        error: Option<ContractError>,
        outflow: f64,
    ) {
        let callback = self
            .callback
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(callback) = callback {
            callback(response, error, outflow);
        }
    }
}

impl fmt::Debug for PendingBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingBatch")
            .field("project", &self.project)
            .field("logstore", &self.logstore)
            .field("topic", &self.topic)
            .field("source", &self.source)
            .field("items", &self.items.len())
            .field("shard_hash", &self.shard_hash)
            .field("package_id", &self.package_id)
            .field("timings", &self.timings)
            .field(
                "has_callback",
                &self
                    .callback
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some(),
            )
            .finish()
    }
}

/// Builder for [`PendingBatch`]
pub struct PendingBatchBuilder {
    project: String,
    logstore: String,
    topic: String,
    source: String,
    items: Vec<LogItem>,
    shard_hash: Option<String>,
    callback: Option<BatchCallback>,
}

impl PendingBatchBuilder {
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn items(mut self, items: Vec<LogItem>) -> Self {
        self.items = items;
        self
    }

    pub fn item(mut self, item: LogItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn shard_hash(mut self, shard_hash: impl Into<String>) -> Self {
        self.shard_hash = Some(shard_hash.into());
        self
    }

    /// Register the completion callback
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Option<PutLogsResponse>, Option<ContractError>, f64) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> PendingBatch {
        PendingBatch {
            project: self.project,
            logstore: self.logstore,
            topic: self.topic,
            source: self.source,
            items: self.items,
            shard_hash: self.shard_hash,
            package_id: next_package_id(),
            timings: BatchTimings::default(),
            callback: Mutex::new(self.callback),
        }
    }
}
