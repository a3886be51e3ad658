//! Error types for session directory operations.

use std::time::Duration;

/// Error type for session directory operations.
///
/// A session that cannot be found is not an error: lookups return `None`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backing store rejected or failed a request.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A backing store call did not complete within the operation timeout.
    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),

    /// A stub handle was used where a live session is required.
    #[error("Session {0} is a stub without live channels")]
    StubHandle(String),

    /// A create-if-absent claim kept losing to a record that disappeared.
    #[error("Claim for key {0} did not settle")]
    Contended(String),

    /// A reconciliation pass was abandoned before pruning.
    #[error("Reconciliation abandoned: {0}")]
    Reconcile(String),
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::Backend(err.to_string())
    }
}

/// Result type for session directory operations.
pub type Result<T> = std::result::Result<T, Error>;
