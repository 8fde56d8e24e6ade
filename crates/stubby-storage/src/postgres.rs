use crate::error::{is_unique_violation, map_sqlx_error};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::time::Duration;
use stubby_core::{NewUrl, Principal, ReadStore, Result, ShortCode, StoreError, UrlStore, UserUrl};
use tracing::{debug, info};
use typed_builder::TypedBuilder;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS urls (
    id SERIAL PRIMARY KEY,
    original_url TEXT NOT NULL,
    short_url TEXT NOT NULL UNIQUE,
    creator_id TEXT NOT NULL,
    is_deleted BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

const CREATE_SHORT_URL_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS short_url_idx ON urls (short_url)";

const CREATE_CREATOR_ID_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS creator_id_idx ON urls (creator_id)";

const INSERT_URL: &str = r#"
INSERT INTO urls (original_url, short_url, creator_id)
VALUES ($1, $2, $3)
"#;

/// Connection settings for [`PostgresStore::connect`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct PostgresOptions {
    #[builder(default = 10)]
    pub max_connections: u32,
    /// How long to wait for a free pooled connection.
    #[builder(default = Duration::from_secs(5))]
    pub acquire_timeout: Duration,
}

impl Default for PostgresOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// PostgreSQL implementation of the store contract.
///
/// Soft delete is implemented with `is_deleted`. Inserts never reuse an
/// existing short code, including soft-deleted rows: the unique constraint
/// on `short_url` rejects them and the violation is reported as
/// [`StoreError::Conflict`]. Lookups read the flag and report
/// [`StoreError::Deleted`] rather than filtering the row out.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store from an existing pool. The schema is not touched.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool and creates the schema if it does not exist yet.
    pub async fn connect(database_url: &str, options: PostgresOptions) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        let store = Self::new(pool);
        store.init_schema().await?;
        info!(
            max_connections = options.max_connections,
            "postgres store initialized"
        );
        Ok(store)
    }

    /// Creates the `urls` table and its indexes in one transaction.
    pub async fn init_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for statement in [CREATE_TABLE, CREATE_SHORT_URL_INDEX, CREATE_CREATOR_ID_INDEX] {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)
    }
}

fn insert_error(err: sqlx::Error, code: &ShortCode) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(code.to_string())
    } else {
        map_sqlx_error(err)
    }
}

#[async_trait]
impl ReadStore for PostgresStore {
    async fn get_url(&self, code: &ShortCode) -> Result<String> {
        let row = sqlx::query(
            r#"
            SELECT original_url, is_deleted
            FROM urls
            WHERE short_url = $1
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(code.to_string()));
        };

        let is_deleted: bool = row.try_get("is_deleted").map_err(map_sqlx_error)?;
        if is_deleted {
            return Err(StoreError::Deleted(code.to_string()));
        }

        row.try_get("original_url").map_err(map_sqlx_error)
    }

    async fn get_user_urls(&self, principal: &Principal) -> Result<Vec<UserUrl>> {
        let rows = sqlx::query(
            r#"
            SELECT short_url, original_url
            FROM urls
            WHERE creator_id = $1
              AND is_deleted = FALSE
            ORDER BY id
            "#,
        )
        .bind(principal.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| -> Result<UserUrl> {
                let short_url: String = row.try_get("short_url").map_err(map_sqlx_error)?;
                Ok(UserUrl {
                    short_url: ShortCode::new_unchecked(short_url),
                    original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl UrlStore for PostgresStore {
    async fn add_url(
        &self,
        principal: &Principal,
        original_url: &str,
        code: &ShortCode,
    ) -> Result<()> {
        sqlx::query(INSERT_URL)
            .bind(original_url)
            .bind(code.as_str())
            .bind(principal.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| insert_error(err, code))?;
        Ok(())
    }

    async fn add_url_batch(&self, principal: &Principal, urls: &[NewUrl]) -> Result<()> {
        if urls.is_empty() {
            return Ok(());
        }

        // Dropping the transaction on an early return rolls the whole batch back.
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for url in urls {
            sqlx::query(INSERT_URL)
                .bind(&url.original_url)
                .bind(url.short_url.as_str())
                .bind(principal.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|err| insert_error(err, &url.short_url))?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(count = urls.len(), "inserted url batch");
        Ok(())
    }

    async fn delete_urls(&self, principal: &Principal, codes: &[ShortCode]) -> Result<usize> {
        if codes.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut deleted = 0u64;
        for code in codes {
            let result = sqlx::query(
                r#"
                UPDATE urls
                SET is_deleted = TRUE
                WHERE short_url = $1
                  AND creator_id = $2
                  AND is_deleted = FALSE
                "#,
            )
            .bind(code.as_str())
            .bind(principal.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            deleted += result.rows_affected();
        }
        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(deleted as usize)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
