//! # Contracts
//!
//! Frozen interface contracts shared by the producer crates: batches, write
//! requests, client traits, configuration and errors.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.

mod batch;
mod blueprint;
mod client;
mod error;
mod log_item;
mod producer_config;
mod request;

pub use batch::{BatchCallback, BatchTimings, PendingBatch, PendingBatchBuilder};
pub use blueprint::*;
pub use client::{BudgetRelease, ClientResolver, LocalLogClient, LogClient};
pub use error::*;
pub use log_item::{LogContent, LogItem};
pub use producer_config::ProducerConfig;
pub use request::*;
