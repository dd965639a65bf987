//! Error types for ledger operations.

use memoledger_store::StoreError;
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur while validating or persisting ledger records.
#[derive(Error, Debug, Clone)]
pub enum LedgerError {
    /// The record is malformed.
    #[error("invalid transaction: {0}")]
    Validation(String),

    /// A record the operation refers to does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The operation clashes with records already in the ledger.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored document could not be decoded.
    #[error("corrupt document at {path}: {message}")]
    Corrupt {
        /// Store path of the document.
        path: String,
        /// Decoder message.
        message: String,
    },

    /// The underlying store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LedgerError::NotFound("sale for memo M9".into());
        assert_eq!(err.to_string(), "sale for memo M9 not found");

        let err: LedgerError = StoreError::Timeout.into();
        assert_eq!(err.to_string(), "store error: request timed out");
    }
}
