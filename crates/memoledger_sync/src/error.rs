//! Error types for coordinated operations.

use crate::operation::OperationId;
use memoledger_ledger::LedgerError;
use memoledger_store::StoreError;
use serde::Serialize;
use thiserror::Error;

/// Result type for units of work.
pub type OperationResult<T> = Result<T, OperationError>;

/// Result type for coordinator calls.
pub type SyncResult<T> = Result<T, CoordinatorError>;

/// Broad category of an [`OperationError`].
///
/// Lets a UI pick between "fix your input" and "we'll retry automatically".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Network-level trouble; retried with backoff.
    Transient,
    /// Malformed input; never retried or queued.
    Validation,
    /// A referenced record is missing.
    NotFound,
    /// The record was already changed in an incompatible way.
    Conflict,
    /// The caller may not perform the operation.
    Permission,
    /// Anything else. Classified by message when deciding whether to retry.
    Other,
}

/// The error a unit of work fails with.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Network, timeout or availability failure.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Input was rejected.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The record was already mutated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Access was denied.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Unclassified failure.
    #[error("{0}")]
    Other(String),
}

impl OperationError {
    /// Creates a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    /// Creates an unclassified error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OperationError::Transient(_) => ErrorKind::Transient,
            OperationError::Validation(_) => ErrorKind::Validation,
            OperationError::NotFound(_) => ErrorKind::NotFound,
            OperationError::Conflict(_) => ErrorKind::Conflict,
            OperationError::Permission(_) => ErrorKind::Permission,
            OperationError::Other(_) => ErrorKind::Other,
        }
    }

    /// Returns the error message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            OperationError::Transient(m)
            | OperationError::Validation(m)
            | OperationError::NotFound(m)
            | OperationError::Conflict(m)
            | OperationError::Permission(m)
            | OperationError::Other(m) => m,
        }
    }
}

impl From<StoreError> for OperationError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::Unavailable(_) | StoreError::Timeout => Self::Transient(message),
            StoreError::Remote { status, .. } => match status {
                502..=504 => Self::Transient(message),
                401 | 403 => Self::Permission(message),
                404 => Self::NotFound(message),
                409 | 412 => Self::Conflict(message),
                400 | 422 => Self::Validation(message),
                _ => Self::Other(message),
            },
            StoreError::PermissionDenied(_) => Self::Permission(message),
            StoreError::InvalidPath { .. } => Self::Validation(message),
            StoreError::OverlappingPaths(_, _) | StoreError::Serialization(_) => {
                Self::Other(message)
            }
        }
    }
}

impl From<LedgerError> for OperationError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(m) => Self::Validation(m),
            LedgerError::NotFound(m) => Self::NotFound(m),
            LedgerError::Conflict(m) => Self::Conflict(m),
            LedgerError::Store(e) => e.into(),
            corrupt @ LedgerError::Corrupt { .. } => Self::Other(corrupt.to_string()),
        }
    }
}

/// Errors returned by [`crate::AtomicOperationCoordinator::execute`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The store was unreachable and no optimistic update was applied, so the
    /// work was deferred to the offline queue without any local effect.
    #[error("operation {id} queued for offline processing")]
    QueuedForOfflineProcessing {
        /// Id of the queued operation.
        id: OperationId,
    },

    /// The operation failed for good, after rollback and fallback ran.
    #[error(transparent)]
    Failed(#[from] OperationError),
}

impl CoordinatorError {
    /// Returns true if the work was queued rather than failed.
    pub fn is_queued(&self) -> bool {
        matches!(self, CoordinatorError::QueuedForOfflineProcessing { .. })
    }

    /// Returns the category of a terminal failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            CoordinatorError::QueuedForOfflineProcessing { .. } => None,
            CoordinatorError::Failed(err) => Some(err.kind()),
        }
    }
}
