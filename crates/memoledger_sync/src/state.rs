//! Observable coordinator state.
//!
//! Every component reports through a [`StateHandle`]: it reads a consistent
//! [`CoordinatorSnapshot`] and mutates state only by dispatching a
//! [`CoordinatorAction`]. [`CoordinatorStore`] is the default handle: a pure
//! reducer behind a lock, with a broadcast feed of applied actions for UIs.

use crate::connection::ConnectionState;
use crate::metrics::PerformanceMetrics;
use crate::operation::{OperationId, QueueEntrySummary};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 256;

/// A state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum CoordinatorAction {
    /// An operation started executing.
    AddPendingOperation {
        /// Operation id.
        id: OperationId,
        /// Operation name.
        name: String,
    },
    /// An operation finished, whatever the outcome.
    RemovePendingOperation {
        /// Operation id.
        id: OperationId,
    },
    /// Work was deferred to the offline queue.
    AddToOfflineQueue(QueueEntrySummary),
    /// A queue entry was resolved.
    RemoveFromOfflineQueue {
        /// Entry id.
        id: OperationId,
    },
    /// A queue entry will be retried on a later pass.
    UpdateOfflineQueueItem {
        /// Entry id.
        id: OperationId,
        /// New retry count.
        retry_count: u32,
    },
    /// Performance metrics changed.
    UpdatePerformanceMetrics(PerformanceMetrics),
    /// Connectivity changed.
    SetConnectionState(ConnectionState),
}

/// A consistent view of coordinator state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorSnapshot {
    /// In-flight operations by id.
    pub pending: BTreeMap<OperationId, String>,
    /// Offline queue entries in FIFO order.
    pub offline_queue: Vec<QueueEntrySummary>,
    /// Aggregate performance metrics.
    pub metrics: PerformanceMetrics,
    /// Last known connectivity.
    pub connection: ConnectionState,
}

impl CoordinatorSnapshot {
    /// Returns true if an operation with this name is in flight.
    pub fn is_pending(&self, name: &str) -> bool {
        self.pending.values().any(|n| n == name)
    }

    /// Applies one action. Pure; unknown ids are ignored.
    pub fn apply(&mut self, action: &CoordinatorAction) {
        match action {
            CoordinatorAction::AddPendingOperation { id, name } => {
                self.pending.insert(*id, name.clone());
            }
            CoordinatorAction::RemovePendingOperation { id } => {
                self.pending.remove(id);
            }
            CoordinatorAction::AddToOfflineQueue(entry) => {
                self.offline_queue.push(entry.clone());
            }
            CoordinatorAction::RemoveFromOfflineQueue { id } => {
                self.offline_queue.retain(|e| e.id != *id);
            }
            CoordinatorAction::UpdateOfflineQueueItem { id, retry_count } => {
                if let Some(entry) = self.offline_queue.iter_mut().find(|e| e.id == *id) {
                    entry.retry_count = *retry_count;
                }
            }
            CoordinatorAction::UpdatePerformanceMetrics(metrics) => {
                self.metrics = metrics.clone();
            }
            CoordinatorAction::SetConnectionState(state) => {
                self.connection = *state;
            }
        }
    }
}

/// Read and dispatch access to coordinator state.
pub trait StateHandle: Send + Sync {
    /// Returns the current state.
    fn snapshot(&self) -> CoordinatorSnapshot;

    /// Applies an action.
    fn dispatch(&self, action: CoordinatorAction);
}

/// In-process [`StateHandle`] with a broadcast feed of applied actions.
pub struct CoordinatorStore {
    state: RwLock<CoordinatorSnapshot>,
    feed: broadcast::Sender<CoordinatorAction>,
}

impl CoordinatorStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            state: RwLock::new(CoordinatorSnapshot::default()),
            feed,
        }
    }

    /// Subscribes to actions applied from now on.
    ///
    /// Slow subscribers may observe `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorAction> {
        self.feed.subscribe()
    }
}

impl Default for CoordinatorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateHandle for CoordinatorStore {
    fn snapshot(&self) -> CoordinatorSnapshot {
        self.state.read().clone()
    }

    fn dispatch(&self, action: CoordinatorAction) {
        let mut state = self.state.write();
        state.apply(&action);
        // Sent under the lock so subscribers see actions in application order.
        let _ = self.feed.send(action);
    }
}

impl std::fmt::Debug for CoordinatorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorStore")
            .field("state", &*self.state.read())
            .finish()
    }
}
