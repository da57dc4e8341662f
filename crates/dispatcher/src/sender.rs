//! BatchSender - per-batch send with retry
//!
//! Runs inside a pool worker (or the graceful drain). Every path, including
//! a panic inside the client or cancellation, releases the batch weight
//! exactly once. The callback fires before the release.

use std::sync::Arc;

use contracts::{
    BudgetRelease, ClientResolver, ContractError, LogClient, LogsFormat, PendingBatch,
    ProducerConfig, PutLogsRequest, PutLogsResponse,
};
use tracing::{debug, error, instrument, warn};

use crate::metrics::DispatchMetrics;
use crate::pool::JobHandler;
use crate::queue::QueuedEntry;
use crate::throughput::ThroughputWindow;

/// Result of one write attempt
#[derive(Debug)]
pub enum RetryOutcome {
    Success(PutLogsResponse),
    /// Failed with attempts remaining
    Retryable(ContractError),
    /// Failed on the last allowed attempt
    Exhausted(ContractError),
}

impl RetryOutcome {
    /// Classify attempt number `attempt` (1-based) out of `max_attempts`
    pub fn classify(
        result: Result<PutLogsResponse, ContractError>,
        attempt: u32,
        max_attempts: u32,
        items: usize,
    ) -> Self {
        match result {
            Ok(response) => Self::Success(response),
            Err(e) if attempt < max_attempts => Self::Retryable(e.with_items_count(items)),
            Err(e) => Self::Exhausted(e.with_items_count(items)),
        }
    }
}

/// Releases the batch weight when dropped
struct BudgetGuard<'a> {
    budget: &'a dyn BudgetRelease,
    bytes: usize,
    package_id: String,
    /// Set once the callback has fired
    resolved: bool,
}

impl Drop for BudgetGuard<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            error!(
                package_id = %self.package_id,
                bytes = self.bytes,
                "Batch dropped before its callback fired, releasing budget"
            );
        }
        self.budget.release_bytes(self.bytes);
    }
}

/// Executes the send protocol for one queued batch
pub struct BatchSender<R: ClientResolver> {
    resolver: Arc<R>,
    budget: Arc<dyn BudgetRelease>,
    window: Arc<ThroughputWindow>,
    metrics: Arc<DispatchMetrics>,
    max_attempts: u32,
    logs_format: LogsFormat,
}

impl<R: ClientResolver> BatchSender<R> {
    pub fn new(
        config: &ProducerConfig,
        resolver: Arc<R>,
        budget: Arc<dyn BudgetRelease>,
        window: Arc<ThroughputWindow>,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            resolver,
            budget,
            window,
            metrics,
            max_attempts: config.max_attempts(),
            logs_format: config.logs_format,
        }
    }

    /// Send one batch, fire its callback, release its weight
    #[instrument(
        name = "batch_sender_send",
        skip(self, entry),
        fields(
            project = %entry.batch.project,
            package_id = %entry.batch.package_id(),
            bytes = entry.bytes
        )
    )]
    pub async fn send(&self, entry: QueuedEntry) {
        let QueuedEntry { batch, bytes } = entry;
        let mut release = BudgetGuard {
            budget: self.budget.as_ref(),
            bytes,
            package_id: batch.package_id().to_string(),
            resolved: false,
        };

        if let Some(latency) = batch.timings().queue_latency() {
            observability::record_queue_latency_ms(latency.as_secs_f64() * 1000.0);
        }

        let Some(client) = self.resolver.get_client(&batch.project) else {
            let err = ContractError::project_config_not_exist(&batch.project);
            error!(project = %batch.project, error = %err, "No client for project");
            self.metrics.inc_config_error_count();
            observability::record_batch_completed(&batch.project, "config_error");
            batch.complete(None, Some(err), 0.0);
            release.resolved = true;
            return;
        };

        let (response, error) = self.write_with_retry(client.as_ref(), &batch, bytes).await;

        let outflow = self.window.outflow();
        observability::record_outflow(outflow);

        let status = if error.is_none() { "success" } else { "failure" };
        observability::record_batch_completed(&batch.project, status);

        batch.complete(response, error, outflow);
        release.resolved = true;
    }

    /// Up to `max_attempts` writes, retried immediately on failure.
    ///
    /// There is no backoff between attempts; a burst of retries can add to
    /// the load of an already struggling endpoint.
    async fn write_with_retry(
        &self,
        client: &R::Client,
        batch: &PendingBatch,
        bytes: usize,
    ) -> (Option<PutLogsResponse>, Option<ContractError>) {
        let mut attempt = 0;
        let outcome = loop {
            attempt += 1;
            let request = PutLogsRequest::from_batch(batch, self.logs_format);
            let result = client.put_logs(&request).await;

            match RetryOutcome::classify(result, attempt, self.max_attempts, batch.items.len()) {
                RetryOutcome::Retryable(e) => {
                    warn!(
                        client = client.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "Write failed, retrying"
                    );
                }
                terminal => break terminal,
            }
        };

        self.metrics.add_attempts(attempt);
        observability::record_send_attempts(&batch.project, attempt);

        match outcome {
            RetryOutcome::Success(response) => {
                self.window.record(bytes);
                self.metrics.inc_success_count();
                debug!(attempt, request_id = %response.request_id, "Batch sent");
                (Some(response), None)
            }
            RetryOutcome::Exhausted(e) | RetryOutcome::Retryable(e) => {
                self.metrics.inc_failure_count();
                error!(attempts = attempt, error = %e, "Batch failed after retries");
                (None, Some(e))
            }
        }
    }
}

impl<R: ClientResolver> JobHandler for BatchSender<R> {
    type Job = QueuedEntry;

    async fn handle(&self, entry: QueuedEntry) {
        self.send(entry).await;
    }
}
