//! # Dispatcher
//!
//! Asynchronous I/O dispatch for log batches.
//!
//! Responsibilities:
//! - Accept batches from producers without blocking them
//! - Hand batches to a bounded worker pool, re-queueing on saturation
//! - Retry failed writes, fire one completion callback per batch
//! - Return each batch's byte weight to the upstream budget
//! - Graceful (draining) and immediate shutdown

pub mod budget;
pub mod client_pool;
pub mod clients;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod sender;
pub mod throughput;

pub use budget::ByteBudget;
pub use client_pool::ClientPool;
pub use clients::{BuiltinClient, ConsoleClient, FileClient, FileClientConfig};
pub use contracts::{BudgetRelease, ClientResolver, LogClient, PendingBatch};
pub use dispatcher::IoDispatcher;
pub use error::DispatcherError;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use pool::{JobHandler, RejectReason, Rejected, WorkerPool};
pub use queue::{BatchQueue, QueuedEntry};
pub use sender::{BatchSender, RetryOutcome};
pub use throughput::{ThroughputWindow, THROUGHPUT_WINDOW};
