use thiserror::Error;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while building core values from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("no principal attached to the request")]
    NoPrincipal,
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("short code already exists: {0}")]
    Conflict(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code has been deleted: {0}")]
    Deleted(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("corrupt log at line {line}: {reason}")]
    CorruptLog { line: usize, reason: String },
    #[error("storage i/o failed: {0}")]
    Io(String),
    #[error("storage is closed")]
    Closed,
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}
