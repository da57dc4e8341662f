//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract snapshots
//! - Delivery guarantees of the I/O dispatcher with scripted clients
//! - Config file to dispatcher wiring

#[cfg(test)]
mod support;

#[cfg(test)]
mod contract_tests {
    use contracts::{ContractError, LogsFormat, PendingBatch, PutLogsRequest, PACK_ID_TAG};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_config_error_snapshot() {
        let err = ContractError::project_config_not_exist("web");
        assert_eq!(err.to_string(), "the config of project web is not exist");
        assert_eq!(err.error_code(), "ProjectConfigNotExist");
    }

    #[test]
    fn test_request_snapshot() {
        let batch = PendingBatch::builder("web", "access")
            .topic("t")
            .source("10.0.0.1")
            .shard_hash("ab")
            .build();
        let request = PutLogsRequest::from_batch(&batch, LogsFormat::Json);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["project"], "web");
        assert_eq!(json["logstore"], "access");
        assert_eq!(json["shard_hash"], "ab");
        assert_eq!(json["content_type"], "application/json");
        assert_eq!(json["tags"][0]["key"], PACK_ID_TAG);
    }
}

#[cfg(test)]
mod delivery_tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use contracts::{ContractError, ProducerConfig};

    use crate::support::{Harness, Script};

    fn config(max_io_workers: usize, retry_times: u32) -> ProducerConfig {
        ProducerConfig {
            max_io_workers,
            retry_times,
            package_timeout_ms: 100,
            ..Default::default()
        }
    }

    /// 3 batches of 100 bytes, always-succeeding destination, one worker
    #[tokio::test]
    async fn test_three_batches_single_worker() {
        let h = Harness::new(&config(1, 3));
        let client = h.register("web", Script::Succeed);

        for _ in 0..3 {
            h.submit("web", 100);
        }

        tokio::time::timeout(Duration::from_millis(100), h.wait_for_callbacks(3))
            .await
            .unwrap();
        h.dispatcher.stop_graceful().await;

        let outcomes = h.outcomes();
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.response.is_some() && o.error.is_none()));
        assert_eq!(h.releases(), vec![100, 100, 100]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    /// One batch to an unregistered destination
    #[tokio::test]
    async fn test_unregistered_destination() {
        let h = Harness::new(&config(4, 3));
        let client = h.register("web", Script::Succeed);

        h.submit("nowhere", 42);
        h.dispatcher.stop_graceful().await;

        let outcomes = h.outcomes();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].response.is_none());
        assert!(matches!(
            outcomes[0].error,
            Some(ContractError::ProjectConfigNotExist { .. })
        ));
        assert_eq!(outcomes[0].outflow, 0.0);
        assert_eq!(h.releases(), vec![42]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.dispatcher.metrics().attempt_count, 0);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let retry_times = 3;
        for k in 0..retry_times {
            let h = Harness::new(&config(2, retry_times));
            let client = h.register("web", Script::FailFirst(k));

            h.submit("web", 10);
            h.dispatcher.stop_graceful().await;

            let outcomes = h.outcomes();
            assert!(outcomes[0].error.is_none(), "k = {k}");
            assert_eq!(client.calls.load(Ordering::SeqCst), k + 1);
            assert_eq!(h.releases(), vec![10]);
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_last_error() {
        let h = Harness::new(&config(2, 2));
        let client = h.register("web", Script::AlwaysFail);

        h.submit("web", 10);
        h.dispatcher.stop_graceful().await;

        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
        let outcomes = h.outcomes();
        match &outcomes[0].error {
            Some(ContractError::Write { request_id, .. }) => assert_eq!(request_id, "attempt-3"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(h.releases(), vec![10]);
    }

    #[tokio::test]
    async fn test_saturation_requeues_without_loss() {
        let h = Harness::new(&config(2, 0));
        h.register("web", Script::Delay(Duration::from_millis(30)));

        for bytes in 1..=10 {
            h.submit("web", bytes);
        }

        tokio::time::timeout(Duration::from_secs(10), h.wait_for_callbacks(10))
            .await
            .unwrap();
        h.dispatcher.stop_graceful().await;

        let mut releases = h.releases();
        releases.sort_unstable();
        assert_eq!(releases, (1..=10).collect::<Vec<_>>());
        assert!(h.dispatcher.metrics().requeued_count > 0);
        assert!(h.dispatcher.live_workers() <= 2);
    }

    #[tokio::test]
    async fn test_graceful_stop_resolves_every_queued_batch() {
        let h = Harness::new(&config(1, 1));
        h.register("web", Script::Delay(Duration::from_millis(5)));
        h.register("flaky", Script::FailFirst(1));

        for i in 0..20 {
            let project = if i % 3 == 0 { "flaky" } else { "web" };
            h.submit(project, 8);
        }
        h.submit("unknown", 8);

        h.dispatcher.stop_graceful().await;

        assert_eq!(h.dispatcher.queue_len(), 0);
        assert_eq!(h.outcomes().len(), 21);
        assert_eq!(h.releases().len(), 21);
        assert_eq!(h.budget.used(), 0);
        assert_eq!(h.resolved_seqs().len(), 21, "every batch resolved exactly once");
    }

    #[tokio::test]
    async fn test_stop_immediate_returns_without_waiting() {
        let h = Harness::new(&config(2, 0));
        h.register("web", Script::Delay(Duration::from_secs(30)));

        for _ in 0..5 {
            h.submit("web", 1);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        h.dispatcher.stop_immediate();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(h.outcomes().is_empty());
        assert!(!h.dispatcher.is_running());
    }

    #[tokio::test]
    async fn test_client_panic_releases_budget_and_worker() {
        let h = Harness::new(&config(1, 0));
        h.register("boom", Script::Panic);
        h.register("web", Script::Succeed);

        h.submit("boom", 5);
        h.submit("web", 7);

        tokio::time::timeout(Duration::from_secs(5), h.wait_for_callbacks(1))
            .await
            .unwrap();
        h.dispatcher.stop_graceful().await;

        let mut releases = h.releases();
        releases.sort_unstable();
        assert_eq!(releases, vec![5, 7]);
        // The panicking batch never reports
        assert_eq!(h.outcomes().len(), 1);
        assert_eq!(h.dispatcher.live_workers(), 0);
    }

    #[tokio::test]
    async fn test_outflow_reported_is_finite() {
        let h = Harness::new(&config(4, 0));
        h.register("web", Script::Delay(Duration::from_millis(2)));

        for _ in 0..8 {
            h.submit("web", 1024);
        }
        h.dispatcher.stop_graceful().await;

        for outcome in h.outcomes().iter() {
            assert!(outcome.outflow.is_finite());
            assert!(outcome.outflow >= 0.0);
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::sync::Arc;

    use config_loader::ConfigLoader;
    use contracts::{BudgetRelease, LogItem, PendingBatch};
    use dispatcher::{ByteBudget, ClientPool, IoDispatcher};
    use tokio::sync::mpsc;

    /// Config file -> client pool -> dispatcher -> file client output
    #[tokio::test]
    async fn test_e2e_file_client_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("audit.jsonl");

        let config_path = dir.path().join("producer.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        write!(
            file,
            r#"
[producer]
max_io_workers = 3
package_timeout_ms = 100
logs_format = "json"

[[projects]]
project = "audit"
client_type = "file"
params = {{ path = "{}" }}

[[projects]]
project = "web"
"#,
            out_path.display()
        )
        .unwrap();

        let blueprint = ConfigLoader::load_from_path(&config_path).unwrap();
        let clients = Arc::new(ClientPool::from_blueprint(&blueprint).unwrap());
        let budget = Arc::new(ByteBudget::new(blueprint.producer.total_size_in_bytes));
        let dispatcher = IoDispatcher::launch(
            &blueprint.producer,
            clients,
            Arc::clone(&budget) as Arc<dyn BudgetRelease>,
        )
        .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        for (i, project) in ["audit", "web", "audit", "audit"].iter().enumerate() {
            let item = LogItem::new(1_700_000_000).with_content("n", i.to_string());
            let bytes = item.approximate_size();
            assert!(budget.try_acquire(bytes));

            let tx = tx.clone();
            let batch = PendingBatch::builder(*project, "events")
                .item(item)
                .callback(move |response, error, _| {
                    let _ = tx.send((response.is_some(), error.is_none()));
                })
                .build();
            dispatcher.submit(batch, bytes);
        }
        drop(tx);

        dispatcher.stop_graceful().await;

        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        assert_eq!(results, vec![(true, true); 4]);
        assert_eq!(budget.used(), 0);

        let content = std::fs::read_to_string(&out_path).unwrap();
        assert_eq!(content.lines().count(), 3);
        for line in content.lines() {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["project"], "audit");
            assert_eq!(value["content_type"], "application/json");
        }
    }
}
