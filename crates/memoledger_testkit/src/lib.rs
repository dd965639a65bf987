//! # memoledger Testkit
//!
//! Test utilities for memoledger.
//!
//! This crate provides:
//! - Fixtures: sample ledgers, dated records, JSON export files, and a
//!   wired-up store/repository/coordinator stack ([`TestLedger`])
//! - Property-based generators for well-formed and loose ledgers
//! - Scripted units of work and hook counters for coordinator tests
//!
//! ## Usage
//!
//! ```rust
//! use memoledger_testkit::prelude::*;
//!
//! let ledger = TestLedger::new();
//! ledger.disconnect();
//! assert!(!ledger.coordinator.connection().is_connected());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod scripted;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::scripted::*;
}

pub use fixtures::*;
pub use generators::*;
pub use scripted::*;
