//! Offline queue of deferred operations.

use crate::operation::{OperationId, QueueEntrySummary, QueuedOperation};
use crate::retry::RetryPolicy;
use crate::state::{CoordinatorAction, StateHandle};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one queue pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueReport {
    /// Entries examined.
    pub processed: usize,
    /// Entries that completed and were removed.
    pub succeeded: usize,
    /// Entries that failed for good and were removed.
    pub failed: usize,
    /// Entries left in place for a later pass.
    pub requeued: usize,
}

/// FIFO queue of work deferred while the store was unreachable.
///
/// Entries are only ever removed by id. Work enqueued while a pass is running
/// is left for the next pass.
pub struct OfflineQueue {
    entries: Mutex<Vec<QueuedOperation>>,
    pass: tokio::sync::Mutex<()>,
    state: Arc<dyn StateHandle>,
}

impl OfflineQueue {
    /// Creates an empty queue reporting to `state`.
    pub fn new(state: Arc<dyn StateHandle>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            pass: tokio::sync::Mutex::new(()),
            state,
        }
    }

    /// Appends an entry.
    pub fn enqueue(&self, operation: QueuedOperation) -> OperationId {
        let id = operation.id;
        let mut entries = self.entries.lock();
        info!(operation = %operation.name, %id, "queued for offline processing");
        self.state
            .dispatch(CoordinatorAction::AddToOfflineQueue(operation.summary()));
        entries.push(operation);
        id
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if no entries are queued.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the entries in FIFO order.
    pub fn summaries(&self) -> Vec<QueueEntrySummary> {
        self.entries.lock().iter().map(QueuedOperation::summary).collect()
    }

    /// Runs every entry present when the pass starts, in FIFO order.
    ///
    /// Each entry resumes its retry budget from its `retry_count`. Success
    /// removes it. A retryable failure with budget left bumps its count and
    /// keeps it. Any other failure runs its rollback and fallback, both
    /// best-effort, and removes it. Concurrent calls run one pass at a time.
    pub async fn process(&self, retry: &RetryPolicy) -> QueueReport {
        let _pass = self.pass.lock().await;
        let snapshot: Vec<QueuedOperation> = self.entries.lock().clone();
        let mut report = QueueReport::default();
        if snapshot.is_empty() {
            return report;
        }

        info!(entries = snapshot.len(), "processing offline queue");
        let mut resolved = HashSet::new();

        for operation in snapshot {
            report.processed += 1;
            let result = retry
                .execute_with_retry(&operation.name, operation.id, operation.retry_count, || {
                    operation.invoke()
                })
                .await;
            retry.clear(operation.id);

            match result {
                Ok(()) => {
                    debug!(operation = %operation.name, id = %operation.id, "queued operation completed");
                    report.succeeded += 1;
                    resolved.insert(operation.id);
                }
                Err(err)
                    if retry.is_retryable_error(&err)
                        && operation.retry_count < retry.max_retries() =>
                {
                    self.bump_retry_count(operation.id);
                    report.requeued += 1;
                }
                Err(err) => {
                    warn!(
                        operation = %operation.name,
                        id = %operation.id,
                        error = %err,
                        "queued operation failed"
                    );
                    if let Some(rollback) = &operation.rollback {
                        if let Err(e) = rollback.call() {
                            warn!(operation = %operation.name, error = %e, "rollback failed");
                        }
                    }
                    if let Some(fallback) = &operation.fallback {
                        if let Err(e) = fallback.invoke().await {
                            warn!(operation = %operation.name, error = %e, "fallback failed");
                        }
                    }
                    report.failed += 1;
                    resolved.insert(operation.id);
                }
            }
        }

        self.remove(&resolved);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            requeued = report.requeued,
            "offline queue pass finished"
        );
        report
    }

    fn bump_retry_count(&self, id: OperationId) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.retry_count += 1;
            debug!(%id, retry_count = entry.retry_count, "requeued");
            self.state.dispatch(CoordinatorAction::UpdateOfflineQueueItem {
                id,
                retry_count: entry.retry_count,
            });
        }
    }

    fn remove(&self, ids: &HashSet<OperationId>) {
        if ids.is_empty() {
            return;
        }
        let mut entries = self.entries.lock();
        entries.retain(|e| !ids.contains(&e.id));
        for id in ids {
            self.state
                .dispatch(CoordinatorAction::RemoveFromOfflineQueue { id: *id });
        }
    }
}

impl std::fmt::Debug for OfflineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineQueue")
            .field("entries", &*self.entries.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::error::OperationError;
    use crate::operation::{Fallback, Hook};
    use crate::state::CoordinatorStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn queue() -> (Arc<CoordinatorStore>, OfflineQueue) {
        let store = Arc::new(CoordinatorStore::new());
        let queue = OfflineQueue::new(store.clone());
        (store, queue)
    }

    fn recording(name: &str, log: Arc<Mutex<Vec<String>>>) -> QueuedOperation {
        let label = name.to_string();
        QueuedOperation::new(name, move || {
            let log = Arc::clone(&log);
            let label = label.clone();
            async move {
                log.lock().push(label);
                Ok(())
            }
        })
    }

    fn always_failing(calls: Arc<AtomicU32>, error: OperationError) -> QueuedOperation {
        QueuedOperation::new("failing", move || {
            let calls = Arc::clone(&calls);
            let error = error.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(error)
            }
        })
    }

    #[tokio::test]
    async fn runs_in_fifo_order() {
        let (store, queue) = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            queue.enqueue(recording(name, log.clone()));
        }
        assert_eq!(store.snapshot().offline_queue.len(), 3);

        let report = queue.process(&RetryPolicy::default()).await;
        assert_eq!(report.succeeded, 3);
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        assert!(queue.is_empty());
        assert!(store.snapshot().offline_queue.is_empty());
    }

    #[tokio::test]
    async fn empty_pass_is_noop() {
        let (_, queue) = queue();
        assert_eq!(
            queue.process(&RetryPolicy::default()).await,
            QueueReport::default()
        );
    }

    #[tokio::test]
    async fn permanent_failure_runs_rollback_and_fallback() {
        let (_, queue) = queue();
        let rolled_back = Arc::new(AtomicU32::new(0));
        let fell_back = Arc::new(AtomicU32::new(0));
        let calls = Arc::new(AtomicU32::new(0));

        let r = rolled_back.clone();
        let f = fell_back.clone();
        let op = always_failing(calls.clone(), OperationError::Validation("amount".into()))
            .with_rollback(Hook::infallible(move || {
                r.fetch_add(1, Ordering::SeqCst);
            }))
            .with_fallback(Fallback::new(move || {
                let f = f.clone();
                async move {
                    f.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }));
        queue.enqueue(op);

        let report = queue.process(&RetryPolicy::default()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rolled_back.load(Ordering::SeqCst), 1);
        assert_eq!(fell_back.load(Ordering::SeqCst), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn failing_hooks_do_not_stop_the_pass() {
        let (_, queue) = queue();
        let log = Arc::new(Mutex::new(Vec::new()));
        let op = always_failing(Arc::new(AtomicU32::new(0)), OperationError::Conflict("x".into()))
            .with_rollback(Hook::new(|| Err(OperationError::other("cache gone"))))
            .with_fallback(Fallback::new(|| async { Err(OperationError::other("no ui")) }));
        queue.enqueue(op);
        queue.enqueue(recording("after", log.clone()));

        let report = queue.process(&RetryPolicy::default()).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(*log.lock(), vec!["after"]);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_requeues_until_budget_spent() {
        let (store, queue) = queue();
        let policy = RetryPolicy::new(RetryConfig::default());
        let calls = Arc::new(AtomicU32::new(0));
        let id = queue.enqueue(always_failing(calls.clone(), OperationError::transient("down")));

        let first = queue.process(&policy).await;
        assert_eq!(first.requeued, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(queue.summaries()[0].retry_count, 1);
        assert_eq!(store.snapshot().offline_queue[0].retry_count, 1);

        queue.process(&policy).await;
        queue.process(&policy).await;
        assert_eq!(queue.summaries()[0].retry_count, 3);

        let last = queue.process(&policy).await;
        assert_eq!(last.failed, 1);
        assert!(queue.is_empty());
        assert!(store
            .snapshot()
            .offline_queue
            .iter()
            .all(|e| e.id != id));
    }
}
