use crate::memory::InMemoryStore;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stubby_core::{
    NewUrl, Principal, ReadStore, Result, ShortCode, StoreError, UrlRecord, UrlStore, UserUrl,
};
use tracing::{debug, error, info, warn};

/// Durable store persisted as newline-delimited JSON.
///
/// Every creation appends one [`UrlRecord`] line. Deletions rewrite the whole
/// log with the affected records flagged, so the log always holds exactly one
/// line per short code. At startup the log is replayed into an
/// [`InMemoryStore`] that serves all reads.
///
/// All mutations are serialized on one mutex guarding the file handle, and
/// the index only changes after the matching write reached the file. File
/// I/O runs on tokio's blocking pool; once started, a write runs to
/// completion even if the calling future is dropped.
#[derive(Debug, Clone)]
pub struct FileLogStore {
    inner: Arc<FileLog>,
}

#[derive(Debug)]
struct FileLog {
    path: PathBuf,
    index: InMemoryStore,
    writer: Mutex<LogWriter>,
}

#[derive(Debug)]
struct LogWriter {
    /// `None` once the store has been closed.
    file: Option<File>,
    /// Length of the log in bytes, i.e. the end of the last complete line.
    len: u64,
}

impl FileLogStore {
    /// Opens the log at `path`, creating it if absent, and replays it.
    ///
    /// Fails if any line cannot be parsed or repeats a short code.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;

        let index = InMemoryStore::new();
        replay(&file, &index)?;

        let mut len = file.metadata()?.len();
        if len > 0 && !ends_with_newline(&mut file)? {
            warn!(path = %path.display(), "log does not end with a newline, terminating last line");
            file.write_all(b"\n")?;
            len += 1;
        }

        info!(path = %path.display(), records = index.len(), "file log opened");
        Ok(Self::from_parts(path, index, file, len))
    }

    /// Assembles a store around an already replayed index and its open log.
    fn from_parts(path: PathBuf, index: InMemoryStore, file: File, len: u64) -> Self {
        Self {
            inner: Arc::new(FileLog {
                path,
                index,
                writer: Mutex::new(LogWriter {
                    file: Some(file),
                    len,
                }),
            }),
        }
    }

    /// Runs `operation` against the log on the blocking pool.
    async fn blocking<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&FileLog) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let log = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || operation(&log))
            .await
            .map_err(|err| StoreError::Io(format!("file log task failed: {err}")))?
    }
}

fn replay(file: &File, index: &InMemoryStore) -> Result<()> {
    let reader = BufReader::new(file);
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let corrupt = |reason: String| StoreError::CorruptLog {
            line: number + 1,
            reason,
        };
        let record: UrlRecord = serde_json::from_str(&line).map_err(|e| corrupt(e.to_string()))?;
        index.commit(record).map_err(|e| corrupt(e.to_string()))?;
    }
    Ok(())
}

fn ends_with_newline(file: &mut File) -> Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn encode_line(record: &UrlRecord) -> Result<Vec<u8>> {
    let mut line =
        serde_json::to_vec(record).map_err(|e| StoreError::InvalidData(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

fn rewrite_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".rewrite");
    PathBuf::from(name)
}

impl LogWriter {
    fn file(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(StoreError::Closed)
    }

    /// Appends one line. On failure the log is cut back to its previous
    /// length so no partial line survives.
    fn append(&mut self, record: &UrlRecord) -> Result<()> {
        let line = encode_line(record)?;
        let len = self.len;
        let file = self.file()?;

        if let Err(err) = file.write_all(&line).and_then(|()| file.flush()) {
            if let Err(truncate_err) = file.set_len(len) {
                error!(error = %truncate_err, "failed to cut back partial log line");
            }
            return Err(err.into());
        }

        self.len += line.len() as u64;
        Ok(())
    }

    /// Replaces the log with `records`.
    ///
    /// The new content is written and synced to a sibling file which is then
    /// renamed over the log, so a crash leaves either the old or the new log.
    fn rewrite(&mut self, path: &Path, records: &[UrlRecord]) -> Result<()> {
        self.file()?;
        let tmp_path = rewrite_path(path);

        let result = write_all_records(&tmp_path, records).and_then(|(file, len)| {
            fs::rename(&tmp_path, path)?;
            Ok((file, len))
        });

        match result {
            Ok((file, len)) => {
                self.file = Some(file);
                self.len = len;
                Ok(())
            }
            Err(err) => {
                if let Err(remove_err) = fs::remove_file(&tmp_path) {
                    debug!(error = %remove_err, "no rewrite file to clean up");
                }
                Err(err)
            }
        }
    }
}

fn write_all_records(path: &Path, records: &[UrlRecord]) -> Result<(File, u64)> {
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    file.set_len(0)?;

    let mut len = 0u64;
    {
        let mut out = BufWriter::new(&file);
        for record in records {
            let line = encode_line(record)?;
            out.write_all(&line)?;
            len += line.len() as u64;
        }
        out.flush()?;
    }
    file.sync_all()?;
    Ok((file, len))
}

impl FileLog {
    fn ping(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file()?.metadata()?;
        Ok(())
    }

    fn add(&self, principal: &Principal, original_url: &str, code: &ShortCode) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.file()?;

        let record = self.index.prepare(principal, original_url, code)?;
        writer.append(&record)?;
        self.index.commit(record)?;

        debug!(code = %code, "appended record to file log");
        Ok(())
    }

    fn delete(&self, principal: &Principal, codes: &[ShortCode]) -> Result<usize> {
        let mut writer = self.writer.lock();
        writer.file()?;

        let targets = self.index.deletable(principal, codes);
        if targets.is_empty() {
            return Ok(0);
        }

        let mut records = self.index.snapshot();
        for record in records.iter_mut() {
            if targets.contains(&record.short_url) {
                record.is_deleted = true;
            }
        }
        writer.rewrite(&self.path, &records)?;

        let deleted = self.index.mark_deleted(principal, &targets).len();
        debug!(deleted, records = records.len(), "rewrote file log");
        Ok(deleted)
    }

    fn close(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        if let Some(file) = writer.file.take() {
            file.sync_all()?;
            info!(path = %self.path.display(), "file log closed");
        }
        Ok(())
    }
}

#[async_trait]
impl ReadStore for FileLogStore {
    async fn get_url(&self, code: &ShortCode) -> Result<String> {
        self.inner.index.lookup(code)
    }

    async fn get_user_urls(&self, principal: &Principal) -> Result<Vec<UserUrl>> {
        Ok(self.inner.index.owned_by(principal))
    }

    async fn ping(&self) -> Result<()> {
        self.blocking(FileLog::ping).await
    }
}

#[async_trait]
impl UrlStore for FileLogStore {
    async fn add_url(
        &self,
        principal: &Principal,
        original_url: &str,
        code: &ShortCode,
    ) -> Result<()> {
        let principal = principal.clone();
        let original_url = original_url.to_owned();
        let code = code.clone();
        self.blocking(move |log| log.add(&principal, &original_url, &code))
            .await
    }

    async fn add_url_batch(&self, principal: &Principal, urls: &[NewUrl]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        let principal = principal.clone();
        let urls = urls.to_vec();
        self.blocking(move |log| {
            for url in &urls {
                log.add(&principal, &url.original_url, &url.short_url)?;
            }
            Ok(())
        })
        .await
    }

    async fn delete_urls(&self, principal: &Principal, codes: &[ShortCode]) -> Result<usize> {
        if codes.is_empty() {
            return Ok(0);
        }

        let principal = principal.clone();
        let codes = codes.to_vec();
        self.blocking(move |log| log.delete(&principal, &codes))
            .await
    }

    async fn close(&self) -> Result<()> {
        self.blocking(FileLog::close).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::Barrier;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn user(id: &str) -> Principal {
        Principal::new(id).unwrap()
    }

    fn log_path(dir: &TempDir) -> PathBuf {
        dir.path().join("urls.log")
    }

    fn read_records(path: &Path) -> Vec<UrlRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn open_creates_missing_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("urls.log");

        let store = FileLogStore::open(&path).unwrap();

        assert!(path.exists());
        assert!(store.inner.index.is_empty());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn add_appends_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let store = FileLogStore::open(&path).unwrap();

        store
            .add_url(&user("u1"), "https://a.com", &code("aaaa"))
            .await
            .unwrap();
        store
            .add_url(&user("u2"), "https://b.com", &code("bbbb"))
            .await
            .unwrap();

        let records = read_records(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].uuid, 1);
        assert_eq!(records[0].short_url, code("aaaa"));
        assert_eq!(records[0].creator_id, user("u1"));
        assert_eq!(records[1].uuid, 2);
        assert!(!records[1].is_deleted);
    }

    #[tokio::test]
    async fn conflict_does_not_touch_the_log() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let store = FileLogStore::open(&path).unwrap();

        store
            .add_url(&user("u1"), "https://a.com", &code("aaaa"))
            .await
            .unwrap();
        let err = store
            .add_url(&user("u2"), "https://other.com", &code("aaaa"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(read_records(&path).len(), 1);
        assert_eq!(store.get_url(&code("aaaa")).await.unwrap(), "https://a.com");
    }

    #[tokio::test]
    async fn reopen_restores_records_and_ownership() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);

        {
            let store = FileLogStore::open(&path).unwrap();
            for i in 0..5 {
                let url = format!("https://example{}.com", i);
                let owner = user(if i % 2 == 0 { "even" } else { "odd" });
                store
                    .add_url(&owner, &url, &ShortCode::from_url(&url))
                    .await
                    .unwrap();
            }
            store.close().await.unwrap();
        }

        let store = FileLogStore::open(&path).unwrap();
        assert_eq!(store.inner.index.len(), 5);
        for i in 0..5 {
            let url = format!("https://example{}.com", i);
            assert_eq!(store.get_url(&ShortCode::from_url(&url)).await.unwrap(), url);
        }
        assert_eq!(store.get_user_urls(&user("even")).await.unwrap().len(), 3);
        assert_eq!(store.get_user_urls(&user("odd")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn sequence_resumes_after_reopen() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);

        {
            let store = FileLogStore::open(&path).unwrap();
            store.add_url(&user("u1"), "https://a.com", &code("a")).await.unwrap();
            store.add_url(&user("u1"), "https://b.com", &code("b")).await.unwrap();
        }

        let store = FileLogStore::open(&path).unwrap();
        store.add_url(&user("u1"), "https://c.com", &code("c")).await.unwrap();

        let uuids: Vec<u64> = read_records(&path).iter().map(|r| r.uuid).collect();
        assert_eq!(uuids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn delete_rewrites_log_and_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let owner = user("u1");

        {
            let store = FileLogStore::open(&path).unwrap();
            store.add_url(&owner, "https://a.com", &code("a")).await.unwrap();
            store.add_url(&owner, "https://b.com", &code("b")).await.unwrap();

            let deleted = store.delete_urls(&owner, &[code("a")]).await.unwrap();
            assert_eq!(deleted, 1);

            let records = read_records(&path);
            assert_eq!(records.len(), 2);
            assert!(records[0].is_deleted);
            assert!(!records[1].is_deleted);

            // appends after a rewrite land in the new log
            store.add_url(&owner, "https://c.com", &code("c")).await.unwrap();
            assert_eq!(read_records(&path).len(), 3);
        }

        let store = FileLogStore::open(&path).unwrap();
        assert!(matches!(
            store.get_url(&code("a")).await,
            Err(StoreError::Deleted(_))
        ));
        assert_eq!(store.get_url(&code("b")).await.unwrap(), "https://b.com");
        assert_eq!(store.get_url(&code("c")).await.unwrap(), "https://c.com");
        assert!(!rewrite_path(&path).exists());
    }

    #[tokio::test]
    async fn delete_by_other_principal_leaves_log_alone() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let store = FileLogStore::open(&path).unwrap();
        store.add_url(&user("u1"), "https://a.com", &code("a")).await.unwrap();
        let before = fs::read(&path).unwrap();

        let deleted = store.delete_urls(&user("u2"), &[code("a")]).await.unwrap();

        assert_eq!(deleted, 0);
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(store.get_url(&code("a")).await.unwrap(), "https://a.com");
    }

    #[tokio::test]
    async fn corrupt_line_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        fs::write(
            &path,
            concat!(
                r#"{"uuid":1,"short_url":"a","original_url":"https://a.com","creator_id":"u1","is_deleted":false}"#,
                "\n",
                "{not json\n",
            ),
        )
        .unwrap();

        let err = FileLogStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::CorruptLog { line: 2, .. }));
    }

    #[tokio::test]
    async fn duplicate_code_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let line = r#"{"uuid":1,"short_url":"a","original_url":"https://a.com","creator_id":"u1","is_deleted":false}"#;
        fs::write(&path, format!("{line}\n{line}\n")).unwrap();

        let err = FileLogStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::CorruptLog { line: 2, .. }));
    }

    #[tokio::test]
    async fn tolerates_blank_lines_and_missing_final_newline() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        fs::write(
            &path,
            concat!(
                r#"{"uuid":1,"short_url":"a","original_url":"https://a.com","creator_id":"u1"}"#,
                "\n\n",
                r#"{"uuid":2,"short_url":"b","original_url":"https://b.com","creator_id":"u1"}"#,
            ),
        )
        .unwrap();

        let store = FileLogStore::open(&path).unwrap();
        store.add_url(&user("u1"), "https://c.com", &code("c")).await.unwrap();

        let records = read_records_skipping_blank(&path);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].uuid, 3);
    }

    fn read_records_skipping_blank(path: &Path) -> Vec<UrlRecord> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_writes() {
        let dir = TempDir::new().unwrap();
        let store = FileLogStore::open(log_path(&dir)).unwrap();
        store.add_url(&user("u1"), "https://a.com", &code("a")).await.unwrap();

        store.close().await.unwrap();
        store.close().await.unwrap();

        let err = store
            .add_url(&user("u1"), "https://b.com", &code("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Closed));
        assert!(matches!(
            store.get_url(&code("b")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.ping().await, Err(StoreError::Closed)));
    }

    #[tokio::test]
    async fn failed_append_leaves_index_and_log_untouched() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        {
            let store = FileLogStore::open(&path).unwrap();
            store.add_url(&user("u1"), "https://a.com", &code("a")).await.unwrap();
        }
        let before = fs::read(&path).unwrap();

        let index = InMemoryStore::new();
        replay(&File::open(&path).unwrap(), &index).unwrap();
        let read_only = File::open(&path).unwrap();
        let store = FileLogStore::from_parts(path.clone(), index, read_only, before.len() as u64);

        let err = store
            .add_url(&user("u1"), "https://b.com", &code("b"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert!(matches!(
            store.get_url(&code("b")).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(fs::read(&path).unwrap(), before);
        let next = store
            .inner
            .index
            .prepare(&user("u1"), "https://b.com", &code("b"))
            .unwrap();
        assert_eq!(next.uuid, 2);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn full_device_rejects_append_without_committing() {
        let device = OpenOptions::new().append(true).open("/dev/full").unwrap();
        let store = FileLogStore::from_parts(
            PathBuf::from("/dev/full"),
            InMemoryStore::new(),
            device,
            0,
        );

        let err = store
            .add_url(&user("u1"), "https://a.com", &code("a"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert!(matches!(
            store.get_url(&code("a")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(store.get_user_urls(&user("u1")).await.unwrap().is_empty());
        let next = store
            .inner
            .index
            .prepare(&user("u1"), "https://a.com", &code("a"))
            .unwrap();
        assert_eq!(next.uuid, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_adds_and_deletes_share_the_writer() {
        let dir = TempDir::new().unwrap();
        let path = log_path(&dir);
        let store = FileLogStore::open(&path).unwrap();
        let start = Arc::new(Barrier::new(100));
        let mut handles = vec![];

        for i in 0..100u64 {
            let store = store.clone();
            let start = Arc::clone(&start);
            handles.push(tokio::spawn(async move {
                let url = format!("https://example{}.com", i);
                let code = ShortCode::from_url(&url);
                let owner = Principal::new(format!("user-{}", i % 4)).unwrap();
                start.wait().await;
                store.add_url(&owner, &url, &code).await?;
                if i % 10 == 0 {
                    let deleted = store.delete_urls(&owner, &[code]).await?;
                    assert_eq!(deleted, 1);
                }
                Ok::<(), StoreError>(())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = read_records(&path);
        assert_eq!(records.len(), 100);
        let mut uuids: Vec<u64> = records.iter().map(|r| r.uuid).collect();
        uuids.sort_unstable();
        assert_eq!(uuids, (1..=100).collect::<Vec<_>>());
        assert_eq!(records.iter().filter(|r| r.is_deleted).count(), 10);

        let reopened = FileLogStore::open(&path).unwrap();
        for i in 0..100u64 {
            let url = format!("https://example{}.com", i);
            let lookup = reopened.get_url(&ShortCode::from_url(&url)).await;
            if i % 10 == 0 {
                assert!(matches!(lookup, Err(StoreError::Deleted(_))));
            } else {
                assert_eq!(lookup.unwrap(), url);
            }
        }
        assert!(!rewrite_path(&path).exists());
    }
}
