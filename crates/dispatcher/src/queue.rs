//! BatchQueue - unbounded FIFO between producers and the dispatch loop
//!
//! Rejected entries are pushed back to the front, so ordering is
//! best-effort under pool saturation.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::PendingBatch;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A batch together with its declared byte weight
#[derive(Debug)]
pub struct QueuedEntry {
    pub batch: PendingBatch,
    /// Used for throughput accounting and budget release only
    pub bytes: usize,
}

impl QueuedEntry {
    pub fn new(batch: PendingBatch, bytes: usize) -> Self {
        Self { batch, bytes }
    }
}

/// Unbounded, thread-safe batch queue
#[derive(Debug, Default)]
pub struct BatchQueue {
    entries: Mutex<VecDeque<QueuedEntry>>,
    notify: Notify,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<QueuedEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail, stamping enqueue begin/end around the append
    pub fn enqueue(&self, mut entry: QueuedEntry) {
        entry.batch.mark_enqueue_begin();
        {
            let mut entries = self.entries();
            entries.push_back(entry);
            if let Some(last) = entries.back_mut() {
                last.batch.mark_enqueue_end();
            }
        }
        self.notify.notify_one();
    }

    /// Re-insert at the head (used after a pool rejection)
    pub fn push_front(&self, entry: QueuedEntry) {
        self.entries().push_front(entry);
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<QueuedEntry> {
        self.entries().pop_front()
    }

    /// Wait up to `timeout` for an entry
    pub async fn poll(&self, timeout: Duration) -> Option<QueuedEntry> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(entry) = self.try_pop() {
                return Some(entry);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_pop();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn entry(logstore: &str, bytes: usize) -> QueuedEntry {
        QueuedEntry::new(PendingBatch::builder("proj", logstore).build(), bytes)
    }

    #[tokio::test]
    async fn test_fifo_order_and_front_reinsert() {
        let queue = BatchQueue::new();
        queue.enqueue(entry("a", 1));
        queue.enqueue(entry("b", 2));

        let first = queue.try_pop().unwrap();
        assert_eq!(first.batch.logstore, "a");

        queue.push_front(first);
        queue.enqueue(entry("c", 3));

        let order: Vec<String> = std::iter::from_fn(|| queue.try_pop())
            .map(|e| e.batch.logstore)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_enqueue_stamps_timings() {
        let queue = BatchQueue::new();
        queue.enqueue(entry("a", 1));
        let popped = queue.try_pop().unwrap();
        let timings = popped.batch.timings();
        assert!(timings.enqueue_begin.is_some());
        assert!(timings.enqueue_end >= timings.enqueue_begin);
    }

    #[tokio::test]
    async fn test_poll_times_out_when_empty() {
        let queue = BatchQueue::new();
        let start = Instant::now();
        assert!(queue.poll(Duration::from_millis(30)).await.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_poll_wakes_on_enqueue() {
        let queue = Arc::new(BatchQueue::new());
        let producer = Arc::clone(&queue);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue(entry("late", 7));
        });

        let got = queue.poll(Duration::from_secs(5)).await.unwrap();
        assert_eq!(got.bytes, 7);
        assert!(queue.is_empty());
    }
}
