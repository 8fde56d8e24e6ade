use crate::file::FileLogStore;
use crate::memory::InMemoryStore;
use crate::postgres::{PostgresOptions, PostgresStore};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use stubby_core::{Result, UrlStore};
use tracing::info;

/// Which backend to run, chosen once at startup.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    InMemory,
    FileLog { path: PathBuf },
    Postgres { dsn: String, options: PostgresOptions },
}

impl StoreConfig {
    /// Picks the most durable backend that has been configured:
    /// a database DSN wins over a log file path, and with neither the
    /// store lives in memory.
    pub fn select(
        database_dsn: Option<String>,
        file_path: Option<PathBuf>,
        options: PostgresOptions,
    ) -> Self {
        match (database_dsn, file_path) {
            (Some(dsn), _) if !dsn.trim().is_empty() => Self::Postgres { dsn, options },
            (_, Some(path)) if !path.as_os_str().is_empty() => Self::FileLog { path },
            _ => Self::InMemory,
        }
    }
}

impl Display for StoreConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::InMemory => write!(f, "in-memory"),
            StoreConfig::FileLog { .. } => write!(f, "file-log"),
            StoreConfig::Postgres { .. } => write!(f, "postgres"),
        }
    }
}

/// Opens the configured backend. Any failure here is fatal for the caller.
pub async fn open_store(config: StoreConfig) -> Result<Arc<dyn UrlStore>> {
    info!(backend = %config, "opening url store");

    let store: Arc<dyn UrlStore> = match config {
        StoreConfig::InMemory => Arc::new(InMemoryStore::new()),
        StoreConfig::FileLog { path } => Arc::new(FileLogStore::open(path)?),
        StoreConfig::Postgres { dsn, options } => {
            Arc::new(PostgresStore::connect(&dsn, options).await?)
        }
    };

    store.ping().await?;
    Ok(store)
}
