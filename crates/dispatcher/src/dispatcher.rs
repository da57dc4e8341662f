//! IoDispatcher - dispatch loop, worker pool and shutdown protocol
//!
//! Producers call [`IoDispatcher::submit`] from any thread. A single loop
//! task moves batches from the queue into the worker pool; rejected batches
//! go back to the head of the queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use contracts::{BudgetRelease, ClientResolver, PendingBatch, ProducerConfig};

use crate::error::DispatcherError;
use crate::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::pool::{RejectReason, WorkerPool};
use crate::queue::{BatchQueue, QueuedEntry};
use crate::sender::BatchSender;
use crate::throughput::ThroughputWindow;

/// State shared between the handle and the loop task
struct Shared<R: ClientResolver> {
    poll_timeout: Duration,
    queue: BatchQueue,
    pool: WorkerPool<BatchSender<R>>,
    metrics: Arc<DispatchMetrics>,
    window: Arc<ThroughputWindow>,
}

/// Asynchronous batch dispatcher
pub struct IoDispatcher<R: ClientResolver> {
    shared: Arc<Shared<R>>,
    stop_tx: watch::Sender<bool>,
    abort_tx: watch::Sender<bool>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl<R: ClientResolver> IoDispatcher<R> {
    /// Create a dispatcher; nothing runs until [`start`](Self::start)
    pub fn new(
        config: &ProducerConfig,
        resolver: Arc<R>,
        budget: Arc<dyn BudgetRelease>,
    ) -> Self {
        let metrics = Arc::new(DispatchMetrics::new());
        let window = Arc::new(ThroughputWindow::new());
        let sender = BatchSender::new(
            config,
            resolver,
            budget,
            Arc::clone(&window),
            Arc::clone(&metrics),
        );
        let pool = WorkerPool::new(
            "io-worker",
            config.max_io_workers,
            config.io_worker_idle_timeout(),
            sender,
        );

        let (stop_tx, _) = watch::channel(false);
        let (abort_tx, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                poll_timeout: config.poll_timeout(),
                queue: BatchQueue::new(),
                pool,
                metrics,
                window,
            }),
            stop_tx,
            abort_tx,
            loop_handle: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    /// Create and start in one step
    pub fn launch(
        config: &ProducerConfig,
        resolver: Arc<R>,
        budget: Arc<dyn BudgetRelease>,
    ) -> Result<Self, DispatcherError> {
        let dispatcher = Self::new(config, resolver, budget);
        dispatcher.start()?;
        Ok(dispatcher)
    }

    fn loop_handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.loop_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the dispatch loop on the current tokio runtime
    ///
    /// # Errors
    /// `AlreadyStarted` on a second call, `Stopped` once a stop was requested
    pub fn start(&self) -> Result<(), DispatcherError> {
        if *self.stop_tx.borrow() {
            return Err(DispatcherError::Stopped);
        }
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(DispatcherError::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let stop_rx = self.stop_tx.subscribe();
        *self.loop_handle() = Some(tokio::spawn(dispatch_loop(shared, stop_rx)));

        info!(
            max_workers = self.shared.pool.max_workers(),
            poll_timeout_ms = self.shared.poll_timeout.as_millis() as u64,
            "IoDispatcher started"
        );
        Ok(())
    }

    /// Queue a batch for delivery; never blocks and never fails
    ///
    /// `bytes` is released to the budget once the batch is resolved.
    pub fn submit(&self, batch: PendingBatch, bytes: usize) {
        trace!(project = %batch.project, package_id = %batch.package_id(), bytes, "Batch submitted");
        self.shared.metrics.inc_submitted_count();
        self.shared.queue.enqueue(QueuedEntry::new(batch, bytes));
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let mut snapshot = self.shared.metrics.snapshot();
        snapshot.queue_len = self.shared.queue.len();
        snapshot
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn live_workers(&self) -> usize {
        self.shared.pool.live_workers()
    }

    /// Current outflow estimate in bytes per second
    pub fn outflow(&self) -> f64 {
        self.shared.window.outflow()
    }

    /// True between `start` and the first stop request
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::Acquire)
            && !*self.stop_tx.borrow()
            && self
                .loop_handle()
                .as_ref()
                .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the loop and resolve every queued batch before returning
    ///
    /// In-flight pool tasks finish normally; queued batches are sent on the
    /// calling task. A concurrent [`stop_immediate`](Self::stop_immediate)
    /// cuts the drain short.
    #[instrument(name = "io_dispatcher_stop_graceful", skip(self))]
    pub async fn stop_graceful(&self) {
        info!(queued = self.shared.queue.len(), "Graceful stop requested");
        self.stop_tx.send_replace(true);
        self.shared.pool.shutdown();

        let handle = self.loop_handle().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    error!(error = ?e, "Dispatch loop panicked");
                }
            }
        }

        let drained = self.drain().await;

        let mut abort_rx = self.abort_tx.subscribe();
        tokio::select! {
            biased;
            () = signalled(&mut abort_rx) => {
                warn!("Immediate stop while waiting for in-flight batches");
            }
            () = self.shared.pool.wait_terminated() => {}
        }

        info!(drained, remaining = self.shared.queue.len(), "IoDispatcher stopped");
    }

    /// Send queued batches one at a time until the queue is empty or an
    /// immediate stop arrives
    ///
    /// Each send runs in its own task and is awaited before the next poll,
    /// so a panicking client cannot take the caller down.
    async fn drain(&self) -> u64 {
        let mut abort_rx = self.abort_tx.subscribe();
        let mut drained = 0;

        while !self.shared.queue.is_empty() {
            let entry = tokio::select! {
                biased;
                () = signalled(&mut abort_rx) => {
                    warn!(drained, remaining = self.shared.queue.len(), "Drain interrupted");
                    break;
                }
                entry = self.shared.queue.poll(self.shared.poll_timeout) => entry,
            };
            let Some(mut entry) = entry else {
                break;
            };

            entry.batch.mark_dispatch_begin(self.shared.queue.len());
            let shared = Arc::clone(&self.shared);
            let mut send = tokio::spawn(async move { shared.pool.handler().send(entry).await });

            tokio::select! {
                biased;
                () = signalled(&mut abort_rx) => {
                    send.abort();
                    warn!(drained, "Drain interrupted mid-send");
                    break;
                }
                joined = &mut send => match joined {
                    Ok(()) => drained += 1,
                    Err(e) => error!(error = ?e, "Internal fault while draining batch"),
                },
            }
        }

        debug!(drained, "Drain finished");
        drained
    }

    /// Stop the loop and abort all workers without waiting
    ///
    /// Queued and in-flight batches may never get a callback.
    pub fn stop_immediate(&self) {
        info!(
            queued = self.shared.queue.len(),
            live_workers = self.shared.pool.live_workers(),
            "Immediate stop requested"
        );
        self.stop_tx.send_replace(true);
        self.abort_tx.send_replace(true);
        self.shared.pool.shutdown_now();
        if let Some(handle) = self.loop_handle().take() {
            handle.abort();
        }
    }
}

impl<R: ClientResolver> Drop for IoDispatcher<R> {
    fn drop(&mut self) {
        self.stop_tx.send_replace(true);
        self.shared.pool.shutdown();
    }
}

/// Resolves once the flag is set or its sender is gone
async fn signalled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|set| *set).await;
}

#[instrument(name = "io_dispatch_loop", skip_all)]
async fn dispatch_loop<R: ClientResolver>(
    shared: Arc<Shared<R>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    debug!("Dispatch loop running");

    loop {
        if shared.window.reset_if_expired() {
            trace!("Throughput window reset");
        }

        let entry = tokio::select! {
            biased;
            () = signalled(&mut stop_rx) => break,
            entry = shared.queue.poll(shared.poll_timeout) => entry,
        };
        let Some(mut entry) = entry else {
            continue;
        };

        let depth = shared.queue.len();
        entry.batch.mark_dispatch_begin(depth);
        shared.metrics.set_queue_len(depth);
        observability::record_queue_depth(depth);

        let Err(rejected) = shared.pool.try_execute(entry) else {
            continue;
        };

        let reason = rejected.reason;
        shared.queue.push_front(rejected.into_job());
        shared.metrics.inc_requeued_count();
        observability::record_batch_requeued();
        debug!(%reason, queue_depth = depth + 1, "Worker pool rejected batch, re-queued");

        if reason == RejectReason::Shutdown {
            break;
        }

        tokio::select! {
            biased;
            () = signalled(&mut stop_rx) => break,
            () = shared.pool.wait_for_capacity(shared.poll_timeout) => {}
        }
    }

    debug!(queued = shared.queue.len(), "Dispatch loop exited");
}
