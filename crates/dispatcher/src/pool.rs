//! WorkerPool - bounded direct hand-off pool
//!
//! A job either starts right away on an idle worker, starts on a newly
//! spawned worker while fewer than `max_workers` are alive, or is handed
//! back to the caller inside a [`Rejected`]. The pool never buffers jobs.
//!
//! Idle workers wait on a one-shot slot registered in the idle list and
//! retire after `idle_timeout`. Registering, handing off and retiring all
//! happen under the same lock, so a job is never lost between a hand-off
//! and a retirement.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, Notify};
use tokio::task::AbortHandle;
use tracing::{debug, error, trace};

/// Work executed by pool workers
pub trait JobHandler: Send + Sync + 'static {
    type Job: Send + 'static;

    fn handle(&self, job: Self::Job) -> impl Future<Output = ()> + Send;
}

/// Why a job was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// All `max_workers` workers are busy
    Saturated,
    /// The pool no longer accepts jobs
    Shutdown,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saturated => write!(f, "saturated"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// A rejected job, returned to the caller untouched
#[derive(Debug)]
pub struct Rejected<J> {
    pub reason: RejectReason,
    pub job: J,
}

impl<J> Rejected<J> {
    pub fn into_job(self) -> J {
        self.job
    }
}

struct IdleWorker<J> {
    id: u64,
    slot: oneshot::Sender<J>,
}

struct PoolState<J> {
    idle: Vec<IdleWorker<J>>,
    live: usize,
    next_id: u64,
    workers: HashMap<u64, AbortHandle>,
    shutdown: bool,
}

struct PoolInner<H: JobHandler> {
    name: String,
    max_workers: usize,
    idle_timeout: Duration,
    handler: H,
    state: Mutex<PoolState<H::Job>>,
    /// Signalled when a worker becomes idle or exits
    capacity: Notify,
    /// Signalled when the last live worker exits
    terminated: Notify,
}

impl<H: JobHandler> PoolInner<H> {
    fn state(&self) -> MutexGuard<'_, PoolState<H::Job>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register as idle; `None` once the pool is shut down
    fn park(&self, id: u64) -> Option<oneshot::Receiver<H::Job>> {
        let mut state = self.state();
        if state.shutdown {
            return None;
        }
        let (slot, rx) = oneshot::channel();
        state.idle.push(IdleWorker { id, slot });
        drop(state);
        self.capacity.notify_one();
        Some(rx)
    }

    /// Remove the worker from the idle list; false if it was already
    /// claimed by a hand-off
    fn unpark(&self, id: u64) -> bool {
        let mut state = self.state();
        match state.idle.iter().position(|w| w.id == id) {
            Some(pos) => {
                state.idle.swap_remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Bounded pool of tokio worker tasks with synchronous rejection
pub struct WorkerPool<H: JobHandler> {
    inner: Arc<PoolInner<H>>,
}

impl<H: JobHandler> WorkerPool<H> {
    /// Create a pool; `max_workers` is clamped to at least 1
    pub fn new(
        name: impl Into<String>,
        max_workers: usize,
        idle_timeout: Duration,
        handler: H,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: name.into(),
                max_workers: max_workers.max(1),
                idle_timeout,
                handler,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    live: 0,
                    next_id: 0,
                    workers: HashMap::new(),
                    shutdown: false,
                }),
                capacity: Notify::new(),
                terminated: Notify::new(),
            }),
        }
    }

    pub fn handler(&self) -> &H {
        &self.inner.handler
    }

    pub fn max_workers(&self) -> usize {
        self.inner.max_workers
    }

    /// Workers currently alive (busy or idle)
    pub fn live_workers(&self) -> usize {
        self.inner.state().live
    }

    pub fn idle_workers(&self) -> usize {
        self.inner.state().idle.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.state().shutdown
    }

    /// Start `job` immediately or hand it back
    ///
    /// Must be called from within a tokio runtime.
    pub fn try_execute(&self, job: H::Job) -> Result<(), Rejected<H::Job>> {
        let mut state = self.inner.state();
        if state.shutdown {
            return Err(Rejected {
                reason: RejectReason::Shutdown,
                job,
            });
        }

        let mut job = job;
        while let Some(worker) = state.idle.pop() {
            match worker.slot.send(job) {
                Ok(()) => {
                    trace!(pool = %self.inner.name, worker = worker.id, "Handed job to idle worker");
                    return Ok(());
                }
                // Receiver dropped (worker aborted); try the next one
                Err(returned) => job = returned,
            }
        }

        if state.live < self.inner.max_workers {
            self.spawn_worker(&mut state, job);
            return Ok(());
        }

        Err(Rejected {
            reason: RejectReason::Saturated,
            job,
        })
    }

    fn spawn_worker(&self, state: &mut PoolState<H::Job>, first: H::Job) {
        let id = state.next_id;
        state.next_id += 1;
        state.live += 1;

        // The guard lives in the task from the start, so a worker aborted
        // before its first poll is still accounted for. The lock is held,
        // so the worker cannot exit before its abort handle is registered.
        let guard = WorkerGuard {
            inner: Arc::clone(&self.inner),
            id,
            finished: false,
        };
        let handle = tokio::spawn(worker_loop(guard, first));
        state.workers.insert(id, handle.abort_handle());

        debug!(pool = %self.inner.name, worker = id, live = state.live, "Spawned worker");
    }

    /// Wait until a worker frees up, at most `timeout`
    pub async fn wait_for_capacity(&self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.inner.capacity.notified()).await;
    }

    /// Stop accepting jobs; running jobs finish, idle workers exit
    pub fn shutdown(&self) {
        let mut state = self.inner.state();
        state.shutdown = true;
        // Dropping the slots wakes the idle workers
        state.idle.clear();
    }

    /// Stop accepting jobs and abort every worker
    pub fn shutdown_now(&self) {
        let mut state = self.inner.state();
        state.shutdown = true;
        state.idle.clear();
        for handle in state.workers.values() {
            handle.abort();
        }
        debug!(pool = %self.inner.name, aborted = state.workers.len(), "Pool aborted");
    }

    /// Wait until no worker is alive
    pub async fn wait_terminated(&self) {
        loop {
            let notified = self.inner.terminated.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.state().live == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Bookkeeping run when a worker exits, including on panic or abort
struct WorkerGuard<H: JobHandler> {
    inner: Arc<PoolInner<H>>,
    id: u64,
    /// Set when the worker loop returned normally
    finished: bool,
}

impl<H: JobHandler> Drop for WorkerGuard<H> {
    fn drop(&mut self) {
        let (live, shutdown) = {
            let mut state = self.inner.state();
            state.live = state.live.saturating_sub(1);
            state.workers.remove(&self.id);
            state.idle.retain(|w| w.id != self.id);
            (state.live, state.shutdown)
        };

        if !self.finished {
            if shutdown {
                debug!(pool = %self.inner.name, worker = self.id, "Worker aborted");
            } else {
                error!(pool = %self.inner.name, worker = self.id, "Worker panicked while running a job");
            }
        }

        self.inner.capacity.notify_one();
        if live == 0 {
            self.inner.terminated.notify_waiters();
        }
    }
}

async fn worker_loop<H: JobHandler>(mut guard: WorkerGuard<H>, first: H::Job) {
    run_worker(&guard.inner, guard.id, first).await;
    guard.finished = true;
}

async fn run_worker<H: JobHandler>(inner: &PoolInner<H>, id: u64, first: H::Job) {
    let mut job = first;
    loop {
        inner.handler.handle(job).await;

        let Some(mut slot) = inner.park(id) else {
            trace!(pool = %inner.name, worker = id, "Pool shut down, worker exiting");
            return;
        };

        job = match tokio::time::timeout(inner.idle_timeout, &mut slot).await {
            Ok(Ok(next)) => next,
            // Slot dropped by shutdown
            Ok(Err(_)) => return,
            Err(_) => {
                if inner.unpark(id) {
                    trace!(pool = %inner.name, worker = id, "Idle worker retired");
                    return;
                }
                // Claimed concurrently with the timeout: the job is already in the slot
                match slot.try_recv() {
                    Ok(next) => next,
                    Err(_) => return,
                }
            }
        };
    }
}
