use crate::error::Result;
use crate::principal::Principal;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A stored URL record.
///
/// The serialized form is also the line format of the file log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Creation sequence number, starting at 1.
    pub uuid: u64,
    pub short_url: ShortCode,
    pub original_url: String,
    /// Owner of the record. Never changes after creation.
    pub creator_id: Principal,
    #[serde(default)]
    pub is_deleted: bool,
}

/// A URL to be inserted, paired with its short code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrl {
    pub short_url: ShortCode,
    pub original_url: String,
}

impl NewUrl {
    /// Pairs `original_url` with the code derived from it.
    pub fn from_url(original_url: impl Into<String>) -> Self {
        let original_url = original_url.into();
        Self {
            short_url: ShortCode::from_url(&original_url),
            original_url,
        }
    }
}

/// A live record owned by a principal, as listed by [`ReadStore::get_user_urls`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUrl {
    pub short_url: ShortCode,
    pub original_url: String,
}

/// The read side of a URL store.
#[async_trait]
pub trait ReadStore: Send + Sync + 'static {
    /// Resolves a short code to its original URL.
    ///
    /// Fails with [`StoreError::NotFound`] if the code was never stored and
    /// with [`StoreError::Deleted`] if it was soft-deleted.
    ///
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    /// [`StoreError::Deleted`]: crate::StoreError::Deleted
    async fn get_url(&self, code: &ShortCode) -> Result<String>;

    /// Lists every non-deleted record owned by `principal`, in no particular order.
    async fn get_user_urls(&self, principal: &Principal) -> Result<Vec<UserUrl>>;

    /// Checks that the backing medium is reachable.
    async fn ping(&self) -> Result<()>;
}

/// A URL store with ownership and soft deletion.
///
/// Batch atomicity differs between implementations: only the relational
/// backend rolls back a partially applied batch. Callers must not rely on it.
#[async_trait]
pub trait UrlStore: ReadStore {
    /// Inserts a new record owned by `principal`.
    /// Returns `Err(Conflict)` if the code already exists, whoever owns it.
    async fn add_url(
        &self,
        principal: &Principal,
        original_url: &str,
        code: &ShortCode,
    ) -> Result<()>;

    /// Inserts several records owned by `principal`.
    async fn add_url_batch(&self, principal: &Principal, urls: &[NewUrl]) -> Result<()>;

    /// Soft-deletes every listed code owned by `principal`.
    ///
    /// Codes that do not exist, are owned by someone else, or are already
    /// deleted are skipped. Returns how many records were newly deleted.
    async fn delete_urls(&self, principal: &Principal, codes: &[ShortCode]) -> Result<usize>;

    /// Releases backend resources. Calling it twice is not an error.
    async fn close(&self) -> Result<()>;
}
