//! # memoledger Store
//!
//! Remote document store contract and implementations for memoledger.
//!
//! This crate provides the lowest-level persistence abstraction. Stores are
//! **key-addressable JSON trees**: every document lives at a `/`-separated
//! path and reading a path returns the whole subtree below it.
//!
//! ## Design Principles
//!
//! - Stores know nothing about transactions, memos or balances
//! - `multi_write` applies all of its updates or none of them
//! - Writing `null` to a path deletes it (empty parents are pruned)
//! - Must be `Send + Sync` so one store can back many in-flight operations
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - In-process store with fault injection, for tests and demos
//!
//! ## Example
//!
//! ```rust
//! use memoledger_store::{DocPath, MemoryStore, RemoteStore};
//! use serde_json::json;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!     let store = MemoryStore::new();
//!     let path = DocPath::parse("customers/c1/name").unwrap();
//!     store.write(&path, json!("Rahim Traders")).await.unwrap();
//!     assert_eq!(store.read(&path).await.unwrap(), Some(json!("Rahim Traders")));
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod path;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use path::DocPath;
pub use store::{RemoteStore, WriteBatch};
