//! Connectivity tracking.

use crate::state::{CoordinatorAction, StateHandle};
use async_trait::async_trait;
use memoledger_store::{DocPath, RemoteStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Whether the remote store is believed reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    /// The store answers requests.
    #[default]
    Connected,
    /// The store cannot be reached; new work is queued.
    Disconnected,
}

impl ConnectionState {
    fn from_reachable(reachable: bool) -> Self {
        if reachable {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

/// Something that can tell whether the remote store is reachable.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Checks reachability once.
    async fn is_reachable(&self) -> bool;
}

/// Probes a [`RemoteStore`] by reading one path.
///
/// Only transient errors count as unreachable; a permission or path error
/// still proves the store answered.
#[derive(Debug)]
pub struct StoreProbe<S> {
    store: S,
    path: DocPath,
}

impl<S: RemoteStore> StoreProbe<S> {
    /// Creates a probe reading `path`.
    pub fn new(store: S, path: DocPath) -> Self {
        Self { store, path }
    }
}

#[async_trait]
impl<S: RemoteStore> ReachabilityProbe for StoreProbe<S> {
    async fn is_reachable(&self) -> bool {
        match self.store.read(&self.path).await {
            Ok(_) => true,
            Err(e) => !e.is_transient(),
        }
    }
}

/// Tracks connectivity and notifies subscribers of transitions.
pub struct ConnectionMonitor {
    tx: watch::Sender<ConnectionState>,
    state: Arc<dyn StateHandle>,
}

impl ConnectionMonitor {
    /// Creates a monitor starting in `initial`.
    pub fn new(initial: ConnectionState, state: Arc<dyn StateHandle>) -> Self {
        let (tx, _) = watch::channel(initial);
        state.dispatch(CoordinatorAction::SetConnectionState(initial));
        Self { tx, state }
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Returns true if the store is believed reachable.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Records a new state. Subscribers and the state handle hear about
    /// changes only; repeating the current state is a no-op.
    ///
    /// Returns true if the state changed.
    pub fn set_state(&self, next: ConnectionState) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            info!(state = ?next, "connection state changed");
            self.state.dispatch(CoordinatorAction::SetConnectionState(next));
        }
        changed
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Spawns a task that polls `probe` every `interval` and records the
    /// result. The task runs until the handle is aborted.
    pub fn spawn_probe(
        self: &Arc<Self>,
        probe: Arc<dyn ReachabilityProbe>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe.is_reachable().await;
                debug!(reachable, "reachability probe");
                monitor.set_state(ConnectionState::from_reachable(reachable));
            }
        })
    }
}

impl std::fmt::Debug for ConnectionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionMonitor")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
