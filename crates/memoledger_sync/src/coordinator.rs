//! The atomic operation coordinator.

use crate::config::CoordinatorConfig;
use crate::connection::{ConnectionMonitor, ConnectionState, ReachabilityProbe};
use crate::error::{CoordinatorError, OperationResult, SyncResult};
use crate::metrics::{PerformanceMetrics, PerformanceTracker};
use crate::operation::{ExecuteOptions, Fallback, OperationId, QueuedOperation};
use crate::queue::{OfflineQueue, QueueReport};
use crate::retry::RetryPolicy;
use crate::state::{CoordinatorAction, CoordinatorSnapshot, CoordinatorStore, StateHandle};
use std::future::Future;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Registers an operation as pending for as long as it is alive.
struct PendingGuard<'a> {
    state: &'a dyn StateHandle,
    id: OperationId,
}

impl<'a> PendingGuard<'a> {
    fn register(state: &'a dyn StateHandle, id: OperationId, name: &str) -> Self {
        state.dispatch(CoordinatorAction::AddPendingOperation {
            id,
            name: name.to_string(),
        });
        Self { state, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.state
            .dispatch(CoordinatorAction::RemovePendingOperation { id: self.id });
    }
}

/// Runs store operations with optimistic updates, retries and offline
/// queueing.
///
/// One coordinator is built at startup and shared behind an `Arc`.
pub struct AtomicOperationCoordinator {
    config: CoordinatorConfig,
    state: Arc<dyn StateHandle>,
    connection: Arc<ConnectionMonitor>,
    retry: RetryPolicy,
    tracker: PerformanceTracker,
    queue: OfflineQueue,
}

impl AtomicOperationCoordinator {
    /// Creates a coordinator from its collaborators.
    pub fn new(
        config: CoordinatorConfig,
        state: Arc<dyn StateHandle>,
        connection: Arc<ConnectionMonitor>,
    ) -> Self {
        Self {
            retry: RetryPolicy::new(config.retry.clone()),
            tracker: PerformanceTracker::new(config.performance.clone(), Arc::clone(&state)),
            queue: OfflineQueue::new(Arc::clone(&state)),
            config,
            state,
            connection,
        }
    }

    /// Creates a coordinator with an in-process state store, starting
    /// connected.
    pub fn in_memory(config: CoordinatorConfig) -> Self {
        let state: Arc<dyn StateHandle> = Arc::new(CoordinatorStore::new());
        let connection = Arc::new(ConnectionMonitor::new(
            ConnectionState::Connected,
            Arc::clone(&state),
        ));
        Self::new(config, state, connection)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the connection monitor.
    pub fn connection(&self) -> &Arc<ConnectionMonitor> {
        &self.connection
    }

    /// Returns the retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Returns the offline queue.
    pub fn offline_queue(&self) -> &OfflineQueue {
        &self.queue
    }

    /// Returns the performance tracker.
    pub fn performance(&self) -> &PerformanceTracker {
        &self.tracker
    }

    /// Returns the aggregate performance metrics.
    pub fn metrics(&self) -> PerformanceMetrics {
        self.tracker.metrics()
    }

    /// Returns a consistent view of coordinator state.
    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.state.snapshot()
    }

    /// Returns true if an operation with this name is in flight.
    pub fn is_pending(&self, name: &str) -> bool {
        self.state.snapshot().is_pending(name)
    }

    /// Runs `run` under the coordinator's guarantees.
    ///
    /// - If an optimistic update is configured, it is applied first; a
    ///   failing update is logged and treated as not applied.
    /// - While disconnected, the work is queued instead of run. The result is
    ///   `Ok(None)` if the optimistic update was applied, otherwise
    ///   [`CoordinatorError::QueuedForOfflineProcessing`].
    /// - While connected, the work runs with retries. Success records
    ///   performance metrics and returns `Ok(Some(value))`.
    /// - A terminal failure runs the rollback (if the update was applied),
    ///   then the fallback, both best-effort, and returns
    ///   [`CoordinatorError::Failed`].
    ///
    /// The operation is pending from entry until this returns.
    pub async fn execute<T, F, Fut>(
        &self,
        name: &str,
        run: F,
        fallback: Option<Fallback>,
        options: ExecuteOptions,
    ) -> SyncResult<Option<T>>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let id = OperationId::new();
        let _pending = PendingGuard::register(&*self.state, id, name);

        let applied = match &options.optimistic_update {
            Some(update) => match update.call() {
                Ok(()) => true,
                Err(e) => {
                    warn!(operation = name, %id, error = %e, "optimistic update failed");
                    false
                }
            },
            None => false,
        };

        if !self.connection.is_connected() {
            let mut queued = QueuedOperation::new(name, move || {
                let work = run();
                async move { work.await.map(|_| ()) }
            })
            .with_id(id);
            if let Some(fallback) = fallback {
                queued = queued.with_fallback(fallback);
            }
            if applied {
                if let Some(rollback) = options.rollback {
                    queued = queued.with_rollback(rollback);
                }
            }
            self.queue.enqueue(queued);

            return if applied {
                Ok(None)
            } else {
                Err(CoordinatorError::QueuedForOfflineProcessing { id })
            };
        }

        let started = Instant::now();
        let result = self.retry.execute_with_retry(name, id, 0, &run).await;
        self.retry.clear(id);

        match result {
            Ok(value) => {
                self.tracker.record(name, started.elapsed());
                debug!(operation = name, %id, "operation completed");
                Ok(Some(value))
            }
            Err(err) => {
                warn!(operation = name, %id, error = %err, "operation failed");
                if applied {
                    if let Some(rollback) = &options.rollback {
                        if let Err(e) = rollback.call() {
                            warn!(operation = name, %id, error = %e, "rollback failed");
                        }
                    }
                }
                if let Some(fallback) = &fallback {
                    if let Err(e) = fallback.invoke().await {
                        warn!(operation = name, %id, error = %e, "fallback failed");
                    }
                }
                Err(CoordinatorError::Failed(err))
            }
        }
    }

    /// Runs one offline-queue pass if connected.
    pub async fn process_offline_queue(&self) -> QueueReport {
        if !self.connection.is_connected() {
            debug!("still disconnected, offline queue left in place");
            return QueueReport::default();
        }
        self.queue.process(&self.retry).await
    }

    /// Spawns a task that runs a queue pass whenever the connection comes
    /// back. The monitor only signals real changes, so every observed
    /// `Connected` follows a `Disconnected`. The task ends once the
    /// coordinator is dropped and the next change arrives.
    pub fn spawn_reconnect_replay(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator: Weak<Self> = Arc::downgrade(self);
        let mut rx = self.connection.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                if *rx.borrow_and_update() != ConnectionState::Connected {
                    continue;
                }
                let Some(coordinator) = coordinator.upgrade() else {
                    break;
                };
                info!("reconnected, replaying offline queue");
                coordinator.process_offline_queue().await;
            }
        })
    }

    /// Spawns a reachability probe at the configured interval.
    pub fn spawn_probe(&self, probe: Arc<dyn ReachabilityProbe>) -> JoinHandle<()> {
        self.connection.spawn_probe(probe, self.config.probe_interval)
    }
}

impl std::fmt::Debug for AtomicOperationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicOperationCoordinator")
            .field("config", &self.config)
            .field("connection", &self.connection)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OperationError;

    #[tokio::test]
    async fn pending_is_cleared_after_success() {
        let coordinator = AtomicOperationCoordinator::in_memory(CoordinatorConfig::new());
        let result = coordinator
            .execute("ping", || async { Ok(7) }, None, ExecuteOptions::new())
            .await;
        assert_eq!(result, Ok(Some(7)));
        assert!(!coordinator.is_pending("ping"));
        assert_eq!(coordinator.metrics().operation_count, 1);
    }

    #[tokio::test]
    async fn pending_is_cleared_after_failure() {
        let coordinator = AtomicOperationCoordinator::in_memory(CoordinatorConfig::new());
        let result: SyncResult<Option<()>> = coordinator
            .execute(
                "ping",
                || async { Err(OperationError::Validation("nope".into())) },
                None,
                ExecuteOptions::new(),
            )
            .await;
        assert!(matches!(result, Err(CoordinatorError::Failed(_))));
        assert!(coordinator.snapshot().pending.is_empty());
        assert_eq!(coordinator.metrics().operation_count, 0);
    }

    #[tokio::test]
    async fn disconnected_queue_pass_is_skipped() {
        let coordinator = AtomicOperationCoordinator::in_memory(CoordinatorConfig::new());
        coordinator
            .connection()
            .set_state(ConnectionState::Disconnected);
        let _ = coordinator
            .execute("later", || async { Ok(()) }, None, ExecuteOptions::new())
            .await;
        assert_eq!(coordinator.offline_queue().len(), 1);

        let report = coordinator.process_offline_queue().await;
        assert_eq!(report, QueueReport::default());
        assert_eq!(coordinator.offline_queue().len(), 1);
    }
}
