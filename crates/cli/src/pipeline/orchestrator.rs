//! Pipeline orchestrator - wires config, clients, budget and dispatcher.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use contracts::{BudgetRelease, LogItem, PendingBatch, ProducerBlueprint};
use dispatcher::{ByteBudget, ClientPool, IoDispatcher};
use observability::DeliveryOutcome;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: ProducerBlueprint,

    /// Destination project of every batch
    pub project: String,

    pub logstore: String,

    /// Number of batches to submit
    pub batches: u64,

    pub items_per_batch: usize,

    /// Callback wait timeout (None = wait for all)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Submits synthetic batches and collects their callbacks
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until every batch is resolved, the timeout fires, `shutdown`
    /// resolves or a batch cannot fit the byte budget; always finishes with a
    /// graceful dispatcher stop
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let config = &self.config;
        let producer = &config.blueprint.producer;

        if let Some(port) = config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let clients = Arc::new(
            ClientPool::from_blueprint(&config.blueprint)
                .map_err(CliError::from)
                .context("Failed to build client pool")?,
        );
        let budget = Arc::new(ByteBudget::new(producer.total_size_in_bytes));
        let release: Arc<dyn BudgetRelease> = Arc::clone(&budget) as Arc<dyn BudgetRelease>;

        let dispatcher =
            IoDispatcher::launch(producer, clients, release).map_err(CliError::from)?;

        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let mut stats = PipelineStats::default();

        tokio::pin!(shutdown);
        let deadline = config.timeout.map(|t| tokio::time::Instant::now() + t);
        let timeout = async {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timeout);

        // Submit
        let mut interrupted = false;
        for seq in 0..config.batches {
            let (batch, bytes) = self.build_batch(seq, outcome_tx.clone());

            tokio::select! {
                biased;
                () = &mut shutdown => {
                    warn!(submitted = stats.submitted, "Shutdown signal received while submitting");
                    interrupted = true;
                    break;
                }
                () = &mut timeout => {
                    stats.timed_out = true;
                    break;
                }
                acquired = budget.acquire(bytes) => {
                    if let Err(e) = acquired {
                        error!(seq, bytes, error = %e, "Batch does not fit the byte budget");
                        stats.budget_rejection = Some(e.to_string());
                        break;
                    }
                }
            }

            dispatcher.submit(batch, bytes);
            stats.submitted += 1;
            stats.bytes_submitted += bytes as u64;
        }
        drop(outcome_tx);
        info!(batches = stats.submitted, bytes = stats.bytes_submitted, "Submission finished");

        // Collect
        while stats.budget_rejection.is_none()
            && !interrupted
            && !stats.timed_out
            && stats.resolved() < stats.submitted
        {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    warn!(pending = stats.pending(), "Shutdown signal received, stopping");
                    interrupted = true;
                }
                () = &mut timeout => {
                    warn!(pending = stats.pending(), "Timed out waiting for callbacks");
                    stats.timed_out = true;
                }
                outcome = outcome_rx.recv() => match outcome {
                    Some(outcome) => stats.delivery.update(&outcome),
                    None => break,
                },
            }
        }

        dispatcher.stop_graceful().await;

        // Callbacks fired during the drain
        while let Ok(outcome) = outcome_rx.try_recv() {
            stats.delivery.update(&outcome);
        }

        stats.interrupted = interrupted;
        stats.dispatch = dispatcher.metrics();
        stats.budget_in_use = budget.used();
        stats.duration = start_time.elapsed();
        Ok(stats)
    }

    fn build_batch(
        &self,
        seq: u64,
        outcome_tx: mpsc::UnboundedSender<DeliveryOutcome>,
    ) -> (PendingBatch, usize) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();

        let items: Vec<LogItem> = (0..self.config.items_per_batch)
            .map(|i| {
                LogItem::new(now)
                    .with_content("seq", seq.to_string())
                    .with_content("index", i.to_string())
                    .with_content("message", format!("synthetic record {seq}/{i}"))
            })
            .collect();
        let bytes = items.iter().map(LogItem::approximate_size).sum();

        let created = Instant::now();
        let batch = PendingBatch::builder(&self.config.project, &self.config.logstore)
            .topic("synthetic")
            .source("log-producer-cli")
            .items(items)
            .callback(move |response, error, outflow| {
                debug!(
                    seq,
                    request_id = response.as_ref().map(|r| r.request_id.as_str()),
                    "Batch resolved"
                );
                let _ = outcome_tx.send(DeliveryOutcome {
                    success: error.is_none(),
                    error_code: error.as_ref().map(|e| e.error_code().to_string()),
                    outflow,
                    elapsed_ms: Some(created.elapsed().as_secs_f64() * 1000.0),
                });
            })
            .build();

        (batch, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ClientType, ConfigVersion, ProducerConfig, ProjectConfig};
    use std::collections::HashMap;

    fn config(project: &str, batches: u64) -> PipelineConfig {
        PipelineConfig {
            blueprint: ProducerBlueprint {
                version: ConfigVersion::V1,
                producer: ProducerConfig {
                    max_io_workers: 2,
                    package_timeout_ms: 20,
                    ..Default::default()
                },
                projects: vec![ProjectConfig {
                    project: "web".into(),
                    client_type: ClientType::Console,
                    params: HashMap::new(),
                }],
            },
            project: project.into(),
            logstore: "store".into(),
            batches,
            items_per_batch: 3,
            timeout: Some(Duration::from_secs(10)),
            metrics_port: None,
        }
    }

    #[tokio::test]
    async fn test_pipeline_delivers_all_batches() {
        let stats = Pipeline::new(config("web", 20))
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.submitted, 20);
        assert_eq!(stats.delivery.total_succeeded, 20);
        assert_eq!(stats.pending(), 0);
        assert_eq!(stats.budget_in_use, 0);
        assert!(!stats.timed_out);
    }

    #[tokio::test]
    async fn test_pipeline_unknown_project_reports_config_errors() {
        let stats = Pipeline::new(config("missing", 3))
            .run(std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.delivery.total_failed, 3);
        assert_eq!(stats.delivery.error_counts["ProjectConfigNotExist"], 3);
        assert_eq!(stats.dispatch.attempt_count, 0);
    }

    #[tokio::test]
    async fn test_pipeline_oversized_batch_still_stops_gracefully() {
        // Batches 0..=9 weigh 123 bytes, batch 10 weighs 129
        let mut config = config("web", 20);
        config.blueprint.producer.total_size_in_bytes = 128;

        let stats = Pipeline::new(config)
            .run(std::future::pending())
            .await
            .unwrap();

        assert!(stats
            .budget_rejection
            .as_deref()
            .is_some_and(|e| e.contains("exceeds budget capacity 128")));
        assert_eq!(stats.submitted, 10);
        assert_eq!(stats.delivery.total_succeeded, 10);
        assert_eq!(stats.pending(), 0);
        assert_eq!(stats.budget_in_use, 0);
    }

    #[tokio::test]
    async fn test_pipeline_stops_on_shutdown() {
        let stats = Pipeline::new(config("web", 1_000))
            .run(async {})
            .await
            .unwrap();

        assert!(stats.interrupted);
        assert_eq!(stats.submitted, 0);
    }
}
