//! Error types for store operations.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to a remote store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The remote answered with an error status.
    #[error("remote error {status}: {message}")]
    Remote {
        /// Status code reported by the remote.
        status: u16,
        /// Error message.
        message: String,
    },

    /// The caller is not allowed to touch the path.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The path is malformed.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Two paths in one batch overlap (one is an ancestor of the other).
    #[error("overlapping paths in batch: {0} and {1}")]
    OverlappingPaths(String, String),

    /// A document could not be converted to or from its typed form.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) | StoreError::Timeout => true,
            StoreError::Remote { status, .. } => matches!(status, 502..=504),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
