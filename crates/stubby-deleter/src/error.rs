use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeleterError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleterError {
    #[error("delete queue is full")]
    QueueFull,
    #[error("delete worker is not running")]
    Closed,
    #[error("delete queue capacity must be at least 1")]
    InvalidCapacity,
    #[error("delete worker panicked: {0}")]
    Crashed(String),
}
