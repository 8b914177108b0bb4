//! # Retrying store adapter.
//!
//! [`RetryStore`] wraps another [`TaskStore`] and re-issues operations that
//! fail with a retryable [`StoreError`] (see [`StoreError::is_retryable`]),
//! sleeping between attempts according to a [`BackoffPolicy`].
//!
//! ```text
//! op() ──► Ok ───────────────────────────────► return
//!   │
//!   └─► Err(e) ──► !e.is_retryable() ────────► return Err(e)
//!          │
//!          └─► attempt == max ───────────────► return Err(e)
//!                 │
//!                 └─► sleep(backoff.next(n)) ─► op()
//! ```

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Created, NewTask, TaskPatch, TaskStore};
use crate::error::StoreError;
use crate::policies::BackoffPolicy;
use crate::record::{ErrorInfo, TaskId, TaskRecord, TaskStatus};

/// Store adapter that retries transient failures.
pub struct RetryStore<S> {
    inner: S,
    backoff: BackoffPolicy,
    max_attempts: u32,
}

impl<S: TaskStore> RetryStore<S> {
    /// Wraps `inner`; each operation is attempted at most `max_attempts` times (min 1).
    pub fn new(inner: S, backoff: BackoffPolicy, max_attempts: u32) -> Self {
        Self {
            inner,
            backoff,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Borrows the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, StoreError>> + Send,
        T: Send,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff.next(attempt);
                    attempt += 1;
                    tracing::warn!(
                        op,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "store operation failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<S: TaskStore> TaskStore for RetryStore<S> {
    async fn create(&self, new: NewTask) -> Result<Created, StoreError> {
        self.retry("create", || self.inner.create(new.clone())).await
    }

    async fn claim(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
        self.retry("claim", || self.inner.claim(id)).await
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<TaskRecord, StoreError> {
        self.retry("update", || self.inner.update(id, patch.clone())).await
    }

    async fn set_status(
        &self,
        id: TaskId,
        status: TaskStatus,
        error: Option<ErrorInfo>,
        at: DateTime<Utc>,
    ) -> Result<TaskRecord, StoreError> {
        self.retry("set_status", || self.inner.set_status(id, status, error.clone(), at)).await
    }

    async fn read(&self, id: TaskId) -> Result<TaskRecord, StoreError> {
        self.retry("read", || self.inner.read(id)).await
    }

    async fn request_abort(&self, id: TaskId) -> Result<bool, StoreError> {
        self.retry("request_abort", || self.inner.request_abort(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::JitterPolicy;
    use crate::store::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails `read` a fixed number of times before delegating.
    struct Flaky {
        inner: MemoryStore,
        failures_left: AtomicU32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TaskStore for Flaky {
        async fn create(&self, new: NewTask) -> Result<Created, StoreError> {
            self.inner.create(new).await
        }
        async fn claim(&self, id: TaskId) -> Result<Option<TaskRecord>, StoreError> {
            self.inner.claim(id).await
        }
        async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<TaskRecord, StoreError> {
            self.inner.update(id, patch).await
        }
        async fn set_status(
            &self,
            id: TaskId,
            status: TaskStatus,
            error: Option<ErrorInfo>,
            at: DateTime<Utc>,
        ) -> Result<TaskRecord, StoreError> {
            self.inner.set_status(id, status, error, at).await
        }
        async fn read(&self, id: TaskId) -> Result<TaskRecord, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable {
                    reason: "flaky".into(),
                });
            }
            self.inner.read(id).await
        }
        async fn request_abort(&self, id: TaskId) -> Result<bool, StoreError> {
            self.inner.request_abort(id).await
        }
    }

    fn fast_backoff() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(1),
            max: Duration::from_millis(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    fn flaky(failures: u32) -> Flaky {
        Flaky {
            inner: MemoryStore::new(),
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let store = RetryStore::new(flaky(2), fast_backoff(), 3);
        let id = TaskId::new();

        // NotFound after two transient failures: retried twice, then surfaced as-is.
        let err = store.read(id).await.unwrap_err();
        assert_eq!(err, StoreError::NotFound { id });
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = RetryStore::new(flaky(10), fast_backoff(), 3);
        let err = store.read(TaskId::new()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_not_repeated() {
        let store = RetryStore::new(flaky(0), fast_backoff(), 5);
        let _ = store.read(TaskId::new()).await.unwrap_err();
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 1);
    }
}
