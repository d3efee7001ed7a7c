use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use loomrpc_common::{LoomError, Result};
use tokio::sync::Semaphore;
use tracing::warn;

/// Bounds the number of concurrently outstanding asynchronous calls.
///
/// Waiters are served in arrival order (the tokio semaphore is FIFO-fair).
/// A failed timed acquire means the process-wide async budget is saturated;
/// callers must reject the call instead of proceeding.
pub struct AsyncAdmission {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl AsyncAdmission {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Acquires one permit, waiting at most `timeout`.
    ///
    /// The permit is wrapped in a [`PermitHold`] so that whichever completion
    /// path fires first can release it without double-counting.
    pub async fn acquire(&self, timeout: Duration) -> Result<PermitHold> {
        match tokio::time::timeout(timeout, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => {
                // The hold hands the permit back through add_permits; forget
                // the RAII guard so it is not returned twice.
                permit.forget();
                Ok(PermitHold::new(self.semaphore.clone()))
            }
            Ok(Err(_)) => Err(LoomError::Internal(
                "admission semaphore closed".to_string(),
            )),
            Err(_) => {
                let info = format!(
                    "acquire timed out after {}ms, {} of {} permits available",
                    timeout.as_millis(),
                    self.semaphore.available_permits(),
                    self.capacity
                );
                warn!("{info}");
                Err(LoomError::TooManyRequests(info))
            }
        }
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One-shot guard around an admission permit.
///
/// Several code paths race to finish an async call (inbound response, send
/// failure, sweep timeout); each may call [`release`](Self::release), but the
/// permit goes back exactly once. Dropping an unreleased hold also returns
/// the permit.
#[derive(Debug)]
pub struct PermitHold {
    semaphore: Arc<Semaphore>,
    released: AtomicBool,
}

impl PermitHold {
    fn new(semaphore: Arc<Semaphore>) -> Self {
        Self {
            semaphore,
            released: AtomicBool::new(false),
        }
    }

    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.semaphore.add_permits(1);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl Drop for PermitHold {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_within_capacity() {
        let admission = AsyncAdmission::new(2);

        let a = admission.acquire(Duration::from_millis(50)).await.unwrap();
        let b = admission.acquire(Duration::from_millis(50)).await.unwrap();
        assert_eq!(admission.available(), 0);

        a.release();
        b.release();
        assert_eq!(admission.available(), 2);
    }

    #[tokio::test]
    async fn test_acquire_times_out_when_saturated() {
        let admission = AsyncAdmission::new(1);

        let _held = admission.acquire(Duration::from_millis(50)).await.unwrap();
        let err = admission
            .acquire(Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, LoomError::TooManyRequests(_)));
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let admission = AsyncAdmission::new(1);

        let hold = admission.acquire(Duration::from_millis(50)).await.unwrap();
        hold.release();
        hold.release();
        hold.release();

        // A double release must not mint extra permits.
        assert_eq!(admission.available(), 1);
        assert!(hold.is_released());
    }

    #[tokio::test]
    async fn test_drop_returns_permit() {
        let admission = AsyncAdmission::new(1);

        {
            let _hold = admission.acquire(Duration::from_millis(50)).await.unwrap();
            assert_eq!(admission.available(), 0);
        }

        assert_eq!(admission.available(), 1);
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_release() {
        let admission = Arc::new(AsyncAdmission::new(1));

        let hold = admission.acquire(Duration::from_millis(50)).await.unwrap();

        let waiter = {
            let admission = admission.clone();
            tokio::spawn(async move { admission.acquire(Duration::from_millis(500)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        hold.release();

        let result = waiter.await.unwrap();
        assert!(result.is_ok());
    }
}
