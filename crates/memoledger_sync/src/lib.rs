//! # memoledger_sync
//!
//! Coordination layer between the ledger UI and the remote store.
//!
//! Every mutation goes through [`AtomicOperationCoordinator::execute`], which
//! gives it the same guarantees:
//!
//! - **Optimistic updates**: local state changes before the store confirms,
//!   and is rolled back if the work ultimately fails
//! - **Bounded retries**: transient failures are retried with exponential
//!   backoff (1s, 2s, 4s, capped at 30s)
//! - **Offline queue**: while the store is unreachable, work is queued and
//!   replayed in FIFO order on reconnect
//! - **Observable state**: pending operations, the queue, connectivity and
//!   response-time metrics are mirrored into a [`StateHandle`]
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │          AtomicOperationCoordinator          │
//! │   ┌──────────────┐     ┌─────────────────┐   │
//! │   │ RetryPolicy  │     │  OfflineQueue   │   │
//! │   └──────────────┘     └─────────────────┘   │
//! │   ┌──────────────┐     ┌─────────────────┐   │
//! │   │ Performance  │     │   Connection    │   │
//! │   │   Tracker    │     │    Monitor      │   │
//! │   └──────────────┘     └─────────────────┘   │
//! └──────────────────────┬───────────────────────┘
//!                        │ dispatch(CoordinatorAction)
//!                ┌───────▼────────┐
//!                │  StateHandle   │
//!                └────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use memoledger_sync::{AtomicOperationCoordinator, CoordinatorConfig, ExecuteOptions};
//!
//! let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! rt.block_on(async {
//!     let coordinator = AtomicOperationCoordinator::in_memory(CoordinatorConfig::new());
//!     let value = coordinator
//!         .execute("answer", || async { Ok(42) }, None, ExecuteOptions::new())
//!         .await
//!         .unwrap();
//!     assert_eq!(value, Some(42));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod coordinator;
mod error;
mod metrics;
mod operation;
mod queue;
mod retry;
mod state;

pub use config::{CoordinatorConfig, PerformanceConfig, RetryConfig};
pub use connection::{ConnectionMonitor, ConnectionState, ReachabilityProbe, StoreProbe};
pub use coordinator::AtomicOperationCoordinator;
pub use error::{CoordinatorError, ErrorKind, OperationError, OperationResult, SyncResult};
pub use metrics::{OperationStats, PerformanceMetrics, PerformanceTracker};
pub use operation::{
    BoxFuture, ExecuteOptions, Fallback, Hook, OperationId, QueueEntrySummary, QueuedOperation,
};
pub use queue::{OfflineQueue, QueueReport};
pub use retry::{RetryPolicy, RetryStats};
pub use state::{CoordinatorAction, CoordinatorSnapshot, CoordinatorStore, StateHandle};
