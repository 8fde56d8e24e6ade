use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use stubby_core::{
    NewUrl, Principal, ReadStore, Result, ShortCode, StoreError, UrlRecord, UrlStore, UserUrl,
};
use tracing::trace;

/// In-memory implementation of the store traits using DashMap.
///
/// DashMap shards its locks, so lookups and inserts for different codes do
/// not block each other. The check-and-insert for a single code goes through
/// the entry API and is atomic.
///
/// Also serves as the index behind [`FileLogStore`](crate::FileLogStore).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: DashMap<String, UrlRecord>,
    last_sequence: AtomicU64,
}

impl InMemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, deleted ones included.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Builds the record an insert would create without storing it.
    ///
    /// The result is only valid while the caller keeps other writers out;
    /// the file log holds its writer lock across `prepare` and `commit`.
    pub(crate) fn prepare(
        &self,
        principal: &Principal,
        original_url: &str,
        code: &ShortCode,
    ) -> Result<UrlRecord> {
        if self.records.contains_key(code.as_str()) {
            return Err(StoreError::Conflict(code.to_string()));
        }

        Ok(UrlRecord {
            uuid: self.last_sequence.load(Ordering::SeqCst) + 1,
            short_url: code.clone(),
            original_url: original_url.to_owned(),
            creator_id: principal.clone(),
            is_deleted: false,
        })
    }

    /// Stores a fully built record, keeping the sequence at its high-water mark.
    pub(crate) fn commit(&self, record: UrlRecord) -> Result<()> {
        match self.records.entry(record.short_url.as_str().to_owned()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(record.short_url.to_string())),
            Entry::Vacant(slot) => {
                self.last_sequence.fetch_max(record.uuid, Ordering::SeqCst);
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Flags the listed records owned by `principal` as deleted and returns
    /// the codes that changed.
    pub(crate) fn mark_deleted(&self, principal: &Principal, codes: &[ShortCode]) -> Vec<ShortCode> {
        let mut changed = Vec::new();
        for code in codes {
            let Some(mut record) = self.records.get_mut(code.as_str()) else {
                trace!(code = %code, "skipping delete of unknown code");
                continue;
            };
            if record.creator_id != *principal || record.is_deleted {
                trace!(code = %code, "skipping delete of foreign or deleted code");
                continue;
            }
            record.is_deleted = true;
            changed.push(code.clone());
        }
        changed
    }

    /// Returns the listed codes [`Self::mark_deleted`] would change, without
    /// changing them. Duplicates are reported once.
    pub(crate) fn deletable(&self, principal: &Principal, codes: &[ShortCode]) -> Vec<ShortCode> {
        let mut found: Vec<ShortCode> = Vec::new();
        for code in codes {
            let owned_and_live = self
                .records
                .get(code.as_str())
                .is_some_and(|record| record.creator_id == *principal && !record.is_deleted);
            if owned_and_live && !found.contains(code) {
                found.push(code.clone());
            }
        }
        found
    }

    /// Copies every record, ordered by creation sequence.
    pub(crate) fn snapshot(&self) -> Vec<UrlRecord> {
        let mut records: Vec<UrlRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.uuid);
        records
    }

    pub(crate) fn lookup(&self, code: &ShortCode) -> Result<String> {
        let Some(record) = self.records.get(code.as_str()) else {
            return Err(StoreError::NotFound(code.to_string()));
        };
        if record.is_deleted {
            return Err(StoreError::Deleted(code.to_string()));
        }
        Ok(record.original_url.clone())
    }

    pub(crate) fn owned_by(&self, principal: &Principal) -> Vec<UserUrl> {
        self.records
            .iter()
            .filter(|entry| entry.creator_id == *principal && !entry.is_deleted)
            .map(|entry| UserUrl {
                short_url: entry.short_url.clone(),
                original_url: entry.original_url.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ReadStore for InMemoryStore {
    async fn get_url(&self, code: &ShortCode) -> Result<String> {
        self.lookup(code)
    }

    async fn get_user_urls(&self, principal: &Principal) -> Result<Vec<UserUrl>> {
        Ok(self.owned_by(principal))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UrlStore for InMemoryStore {
    async fn add_url(
        &self,
        principal: &Principal,
        original_url: &str,
        code: &ShortCode,
    ) -> Result<()> {
        match self.records.entry(code.as_str().to_owned()) {
            Entry::Occupied(_) => Err(StoreError::Conflict(code.to_string())),
            Entry::Vacant(slot) => {
                let uuid = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
                slot.insert(UrlRecord {
                    uuid,
                    short_url: code.clone(),
                    original_url: original_url.to_owned(),
                    creator_id: principal.clone(),
                    is_deleted: false,
                });
                Ok(())
            }
        }
    }

    async fn add_url_batch(&self, principal: &Principal, urls: &[NewUrl]) -> Result<()> {
        for url in urls {
            self.add_url(principal, &url.original_url, &url.short_url)
                .await?;
        }
        Ok(())
    }

    async fn delete_urls(&self, principal: &Principal, codes: &[ShortCode]) -> Result<usize> {
        Ok(self.mark_deleted(principal, codes).len())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
