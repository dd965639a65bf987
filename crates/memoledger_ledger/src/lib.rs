//! # memoledger Ledger
//!
//! Transaction records, memo-scoped reconciliation and ledger persistence.
//!
//! This crate provides:
//! - [`Transaction`] records with an explicit [`TransactionKind`] (sale or payment)
//! - Memo reconciliation: [`group_by_memo`] folds a customer's records into
//!   [`MemoGroup`]s with computed due amounts and [`MemoStatus`]
//! - Statement views: [`running_balance`] over a filtered, date-ordered set
//! - Customer aggregates: [`CustomerBalance`]
//! - [`LedgerRepository`]: persistence through a [`memoledger_store::RemoteStore`]
//!
//! ## Key Invariants
//!
//! - `due_amount == total_amount - paid_amount` for every memo group
//! - A memo group without a sale is incomplete and never counts toward totals
//! - Memo groups are a pure projection; they are recomputed, never stored
//! - A transaction and its customer's aggregate are written in one atomic batch

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod balance;
mod error;
mod reconcile;
mod repository;
mod types;

pub use balance::CustomerBalance;
pub use error::{LedgerError, LedgerResult};
pub use reconcile::{
    complete_groups, group_by_memo, running_balance, DateRange, LedgerSummary, MemoGroup,
    MemoStatus, StatementLine,
};
pub use repository::{ActivityEntry, LedgerRepository};
pub use types::{Amount, CustomerId, MemoNumber, Transaction, TransactionId, TransactionKind};
