use crate::error::{Result, StoreError};
use std::future::Future;
use std::time::Duration;

/// Awaits a store operation, giving up once `limit` has elapsed.
///
/// On expiry the operation future is dropped and
/// [`StoreError::DeadlineExceeded`] is returned. Work the backend already
/// committed stays committed: an uncommitted sqlx transaction rolls back when
/// dropped, and a file-log write already running on the blocking pool still
/// completes.
/// `None` waits without a limit.
pub async fn with_deadline<T, F>(limit: Option<Duration>, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, operation)
            .await
            .map_err(|_| StoreError::DeadlineExceeded(limit))?,
        None => operation.await,
    }
}
