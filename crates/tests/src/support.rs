//! Scripted clients and a dispatcher harness recording every callback
//! and every budget release.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use contracts::{
    BudgetRelease, ContractError, LogClient, LogItem, PendingBatch, ProducerConfig,
    PutLogsRequest, PutLogsResponse,
};
use dispatcher::{ByteBudget, ClientPool, IoDispatcher};
use tokio::sync::Notify;

/// Scripted write behaviour
#[derive(Debug, Clone, Copy)]
pub enum Script {
    Succeed,
    /// Fail the first `n` writes, then succeed
    FailFirst(u32),
    AlwaysFail,
    /// Succeed after sleeping
    Delay(Duration),
    Panic,
}

pub struct ScriptedClient {
    script: Script,
    pub calls: AtomicU32,
}

impl LogClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn put_logs(
        &self,
        _request: &PutLogsRequest<'_>,
    ) -> Result<PutLogsResponse, ContractError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let failed = || {
            Err(ContractError::write(
                "InternalServerError",
                format!("scripted failure {call}"),
                format!("attempt-{call}"),
            ))
        };

        match self.script {
            Script::Succeed => {}
            Script::FailFirst(n) if call <= n => return failed(),
            Script::FailFirst(_) => {}
            Script::AlwaysFail => return failed(),
            Script::Delay(delay) => tokio::time::sleep(delay).await,
            Script::Panic => panic!("scripted client panic"),
        }
        Ok(PutLogsResponse::new(format!("attempt-{call}")))
    }
}

/// What a callback received
#[derive(Debug)]
pub struct Outcome {
    /// Submission sequence number
    pub seq: u64,
    pub response: Option<PutLogsResponse>,
    pub error: Option<ContractError>,
    pub outflow: f64,
}

/// Budget that also records each release
struct RecordingBudget {
    inner: Arc<ByteBudget>,
    releases: Arc<Mutex<Vec<usize>>>,
}

impl BudgetRelease for RecordingBudget {
    fn release_bytes(&self, bytes: usize) {
        self.releases.lock().unwrap().push(bytes);
        self.inner.release_bytes(bytes);
    }
}

pub struct Harness {
    pub dispatcher: IoDispatcher<ClientPool<ScriptedClient>>,
    pub budget: Arc<ByteBudget>,
    clients: Arc<ClientPool<ScriptedClient>>,
    releases: Arc<Mutex<Vec<usize>>>,
    outcomes: Arc<Mutex<Vec<Outcome>>>,
    resolved: Arc<Notify>,
    next_seq: AtomicU64,
}

impl Harness {
    /// Started dispatcher with no registered clients
    pub fn new(config: &ProducerConfig) -> Self {
        let clients = Arc::new(ClientPool::new());
        let budget = Arc::new(ByteBudget::new(config.total_size_in_bytes));
        let releases = Arc::new(Mutex::new(Vec::new()));
        let release: Arc<dyn BudgetRelease> = Arc::new(RecordingBudget {
            inner: Arc::clone(&budget),
            releases: Arc::clone(&releases),
        });

        Self {
            dispatcher: IoDispatcher::launch(config, Arc::clone(&clients), release).unwrap(),
            budget,
            clients,
            releases,
            outcomes: Arc::new(Mutex::new(Vec::new())),
            resolved: Arc::new(Notify::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn register(&self, project: &str, script: Script) -> Arc<ScriptedClient> {
        let client = Arc::new(ScriptedClient {
            script,
            calls: AtomicU32::new(0),
        });
        self.clients.update_client(project, Arc::clone(&client));
        client
    }

    /// Acquire budget and submit a one-record batch of weight `bytes`
    pub fn submit(&self, project: &str, bytes: usize) {
        assert!(self.budget.try_acquire(bytes));

        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let outcomes = Arc::clone(&self.outcomes);
        let resolved = Arc::clone(&self.resolved);
        let batch = PendingBatch::builder(project, "store")
            .item(LogItem::new(1).with_content("seq", seq.to_string()))
            .callback(move |response, error, outflow| {
                outcomes.lock().unwrap().push(Outcome {
                    seq,
                    response,
                    error,
                    outflow,
                });
                resolved.notify_one();
            })
            .build();
        self.dispatcher.submit(batch, bytes);
    }

    pub async fn wait_for_callbacks(&self, count: usize) {
        loop {
            let notified = self.resolved.notified();
            if self.outcomes.lock().unwrap().len() >= count {
                return;
            }
            let _ = tokio::time::timeout(Duration::from_millis(10), notified).await;
        }
    }

    pub fn outcomes(&self) -> MutexGuard<'_, Vec<Outcome>> {
        self.outcomes.lock().unwrap()
    }

    pub fn releases(&self) -> Vec<usize> {
        self.releases.lock().unwrap().clone()
    }

    /// Distinct submissions seen by callbacks so far
    pub fn resolved_seqs(&self) -> HashSet<u64> {
        self.outcomes().iter().map(|o| o.seq).collect()
    }
}
