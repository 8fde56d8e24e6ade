use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use stubby_core::{with_deadline, ShortCode, UrlStore};
use stubby_deleter::DeleteQueue;

#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn UrlStore>,
    deletes: DeleteQueue,
    base_url: String,
    request_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn UrlStore>,
        deletes: DeleteQueue,
        public_base_url: impl Into<String>,
        request_timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            deletes,
            base_url: public_base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
        }
    }

    pub fn store(&self) -> &dyn UrlStore {
        self.store.as_ref()
    }

    pub fn deletes(&self) -> &DeleteQueue {
        &self.deletes
    }

    /// Full public URL for `code`.
    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }

    /// Runs a store call under the per-request deadline.
    pub async fn bounded<T, F>(&self, operation: F) -> stubby_core::Result<T>
    where
        F: Future<Output = stubby_core::Result<T>>,
    {
        with_deadline(self.request_timeout, operation).await
    }
}
