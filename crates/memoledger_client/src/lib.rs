//! # memoledger_client
//!
//! Records sales and payments against customer memos.
//!
//! [`LedgerClient`] validates each record locally, applies it to an
//! in-memory cache straight away and hands the store write to the
//! [`AtomicOperationCoordinator`](memoledger_sync::AtomicOperationCoordinator).
//! If the write ultimately fails the cache entry is removed again; while the
//! store is unreachable the write waits in the offline queue and the record
//! is reported as [`SyncStatus::Pending`].
//!
//! Reconciliation views (memo groups, statements, balances) are computed
//! from the cache, so they include pending writes.
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use memoledger_client::{LedgerClient, NewSale};
//! use memoledger_ledger::LedgerRepository;
//! use memoledger_store::MemoryStore;
//! use memoledger_sync::{AtomicOperationCoordinator, CoordinatorConfig};
//! use std::sync::Arc;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! rt.block_on(async {
//!     let client = LedgerClient::new(
//!         Arc::new(AtomicOperationCoordinator::in_memory(CoordinatorConfig::new())),
//!         Arc::new(LedgerRepository::new(Arc::new(MemoryStore::new()))),
//!     );
//!
//!     let recorded = client
//!         .record_sale(NewSale {
//!             customer_id: "c1".into(),
//!             memo_number: "M1".into(),
//!             total: 1000,
//!             deposit: 200,
//!             date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
//!             note: None,
//!         })
//!         .await
//!         .unwrap();
//!
//!     assert!(!recorded.status.is_pending());
//!     assert_eq!(client.balance(&"c1".into()).total_due, 800);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;

pub use client::{LedgerClient, NewPayment, NewSale, Recorded, SyncStatus};
pub use error::{ClientError, ClientResult};
