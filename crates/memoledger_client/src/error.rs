//! Error types for the ledger client.

use memoledger_ledger::LedgerError;
use memoledger_sync::{ErrorKind, OperationError, OperationId};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by [`crate::LedgerClient`].
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Rejected locally before reaching the coordinator, or a direct read
    /// failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A coordinated write failed for good; local state was rolled back.
    #[error(transparent)]
    Operation(#[from] OperationError),

    /// The write was queued with no local effect.
    #[error("write {0} queued for offline processing")]
    Queued(OperationId),
}

impl ClientError {
    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Ledger(e) => OperationError::from(e.clone()).kind(),
            ClientError::Operation(e) => e.kind(),
            ClientError::Queued(_) => ErrorKind::Transient,
        }
    }
}
