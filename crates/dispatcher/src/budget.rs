//! ByteBudget - upstream admission budget for in-flight bytes
//!
//! Producers acquire a batch's weight before `submit`; the dispatcher
//! returns it through [`BudgetRelease`] once the batch is resolved.

use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::BudgetRelease;
use tokio::sync::Notify;
use tracing::warn;

use crate::error::DispatcherError;

#[derive(Debug)]
pub struct ByteBudget {
    capacity: usize,
    used: Mutex<usize>,
    released: Notify,
}

impl ByteBudget {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: Mutex::new(0),
            released: Notify::new(),
        }
    }

    fn used_guard(&self) -> MutexGuard<'_, usize> {
        self.used.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        *self.used_guard()
    }

    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.used())
    }

    /// Reserve `bytes` if they fit right now
    pub fn try_acquire(&self, bytes: usize) -> bool {
        let mut used = self.used_guard();
        if bytes <= self.capacity.saturating_sub(*used) {
            *used += bytes;
            true
        } else {
            false
        }
    }

    /// Wait until `bytes` fit, then reserve them
    ///
    /// # Errors
    /// `BudgetExceeded` if `bytes` is larger than the whole capacity
    pub async fn acquire(&self, bytes: usize) -> Result<(), DispatcherError> {
        if bytes > self.capacity {
            return Err(DispatcherError::BudgetExceeded {
                requested: bytes,
                capacity: self.capacity,
            });
        }

        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.try_acquire(bytes) {
                return Ok(());
            }
            notified.await;
        }
    }
}

impl BudgetRelease for ByteBudget {
    fn release_bytes(&self, bytes: usize) {
        {
            let mut used = self.used_guard();
            if bytes > *used {
                warn!(bytes, used = *used, "Released more bytes than acquired");
            }
            *used = used.saturating_sub(bytes);
        }
        self.released.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_try_acquire_respects_capacity() {
        let budget = ByteBudget::new(100);
        assert!(budget.try_acquire(60));
        assert!(!budget.try_acquire(41));
        assert!(budget.try_acquire(40));
        assert_eq!(budget.available(), 0);

        budget.release_bytes(100);
        assert_eq!(budget.used(), 0);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_release() {
        let budget = Arc::new(ByteBudget::new(10));
        assert!(budget.try_acquire(10));

        let waiter = {
            let budget = Arc::clone(&budget);
            tokio::spawn(async move { budget.acquire(5).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        budget.release_bytes(10);
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(budget.used(), 5);
    }

    #[tokio::test]
    async fn test_acquire_larger_than_capacity_fails() {
        let budget = ByteBudget::new(10);
        assert!(matches!(
            budget.acquire(11).await,
            Err(DispatcherError::BudgetExceeded {
                requested: 11,
                capacity: 10
            })
        ));
    }

    #[test]
    fn test_over_release_saturates() {
        let budget = ByteBudget::new(10);
        budget.release_bytes(3);
        assert_eq!(budget.used(), 0);
    }
}
