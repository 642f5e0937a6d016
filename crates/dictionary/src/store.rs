//! Dictionary store trait and the SQLite implementation.

use crate::chunk::chunk_ranges;
use crate::error::{DictionaryError, DictionaryResult, ReplacePhase};
use crate::models::FetchMetaRow;
use async_trait::async_trait;
use cpedict_core::{BuildInfo, CpeEntry, FetchType, vendor_product};
use cpedict_core::{DELETE_CHUNK_SIZE, INSERT_CHUNK_SIZE};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Observer for insert progress during a generation replace.
///
/// Called after each insert statement with the cumulative row count. The
/// replace commits identically whether or not an observer is attached.
pub trait ReplaceProgress: Send + Sync {
    fn inserted(&self, rows: usize);
}

/// Capability set every dictionary backend must satisfy.
///
/// One concrete type per backend; each owns its own connection pool.
#[async_trait]
pub trait DictionaryStore: Send + Sync {
    /// Ensure required tables and indexes exist. Additive only.
    async fn migrate(&self) -> DictionaryResult<()>;

    /// Detect a store written before schema versioning existed: user tables
    /// present but no `fetch_meta` table. Such a store is refused, not
    /// migrated.
    async fn is_legacy_schema(&self) -> DictionaryResult<bool>;

    /// Stored fetch metadata, or a fresh row stamped from `build` when the
    /// store has never been fetched into. Absence is not an error.
    async fn fetch_meta(&self, build: &BuildInfo) -> DictionaryResult<FetchMetaRow>;

    /// Persist the metadata row, overwriting `revision` and `schema_version`
    /// with `build`'s values. Callers cannot fake the build identity.
    async fn upsert_fetch_meta(
        &self,
        meta: &FetchMetaRow,
        build: &BuildInfo,
    ) -> DictionaryResult<()>;

    /// Distinct `"vendor::product"` pairs across all stored entries.
    async fn vendor_products(&self) -> DictionaryResult<Vec<String>>;

    /// CPE URIs matching the vendor and product patterns (SQL LIKE
    /// semantics, `%`/`_` wildcards), partitioned into (active, deprecated).
    /// Results are distinct; no match is an empty result, not an error.
    async fn cpes_by_vendor_product(
        &self,
        vendor: &str,
        product: &str,
    ) -> DictionaryResult<(Vec<String>, Vec<String>)>;

    /// Atomically swap every entry of `fetch_type` for the supplied batch.
    ///
    /// Runs in one transaction: the previous generation's ids are selected,
    /// deleted in chunks of [`DELETE_CHUNK_SIZE`], and the batch inserted in
    /// chunks of [`INSERT_CHUNK_SIZE`]. Chunking bounds statement size only;
    /// any failure rolls the whole transaction back and the prior generation
    /// survives intact.
    async fn replace_generation(
        &self,
        fetch_type: FetchType,
        entries: &[CpeEntry],
        progress: Option<&dyn ReplaceProgress>,
    ) -> DictionaryResult<()>;

    /// Whether a CPE URI is recorded as deprecated.
    async fn is_deprecated(&self, cpe_uri: &str) -> DictionaryResult<bool>;

    /// Check backend connectivity.
    async fn health_check(&self) -> DictionaryResult<()>;

    /// Release the connection pool. Idempotent.
    async fn close(&self) -> DictionaryResult<()>;
}

impl std::fmt::Debug for dyn DictionaryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DictionaryStore")
    }
}

/// SQLite-backed dictionary store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

fn is_sqlite_locked(err: &sqlx::Error) -> bool {
    // 5 = SQLITE_BUSY, 6 = SQLITE_LOCKED, plus their extended codes.
    if let sqlx::Error::Database(db) = err {
        matches!(db.code().as_deref(), Some("5" | "6" | "261" | "517"))
    } else {
        false
    }
}

impl SqliteStore {
    /// Open (creating if missing) the database file.
    ///
    /// Reports [`DictionaryError::Locked`] when another process holds the
    /// file past `busy_timeout_secs`; that is the only retryable open
    /// failure.
    pub async fn new(
        path: impl AsRef<Path>,
        busy_timeout_secs: u64,
        log_queries: bool,
    ) -> DictionaryResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DictionaryError::Config(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .foreign_keys(true)
                .busy_timeout(Duration::from_secs(busy_timeout_secs));

        if !log_queries {
            opts = opts.disable_statement_logging();
        }

        // SQLite permits limited write concurrency; a single connection
        // avoids persistent "database is locked" failures within the process.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await
            .map_err(|e| {
                if is_sqlite_locked(&e) {
                    DictionaryError::Locked { dialect: "sqlite" }
                } else {
                    DictionaryError::Database(e)
                }
            })?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl DictionaryStore for SqliteStore {
    async fn migrate(&self) -> DictionaryResult<()> {
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(DictionaryError::Migration)?;
        Ok(())
    }

    async fn is_legacy_schema(&self) -> DictionaryResult<bool> {
        let has_meta: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'fetch_meta')",
        )
        .fetch_one(&self.pool)
        .await?;
        if has_meta {
            return Ok(false);
        }

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(tables > 0)
    }

    async fn fetch_meta(&self, build: &BuildInfo) -> DictionaryResult<FetchMetaRow> {
        let row = sqlx::query_as::<_, FetchMetaRow>(
            "SELECT id, revision, schema_version, last_fetched_at FROM fetch_meta WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.unwrap_or_else(|| FetchMetaRow::initial(build)))
    }

    async fn upsert_fetch_meta(
        &self,
        meta: &FetchMetaRow,
        build: &BuildInfo,
    ) -> DictionaryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fetch_meta (id, revision, schema_version, last_fetched_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                revision = excluded.revision,
                schema_version = excluded.schema_version,
                last_fetched_at = excluded.last_fetched_at
            "#,
        )
        .bind(&build.revision)
        .bind(build.schema_version)
        .bind(meta.last_fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn vendor_products(&self) -> DictionaryResult<Vec<String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT vendor, product FROM cpes ORDER BY vendor, product",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(vendor, product)| vendor_product(&vendor, &product))
            .collect())
    }

    async fn cpes_by_vendor_product(
        &self,
        vendor: &str,
        product: &str,
    ) -> DictionaryResult<(Vec<String>, Vec<String>)> {
        let rows: Vec<(String, bool)> = sqlx::query_as(
            "SELECT DISTINCT cpe_uri, deprecated FROM cpes WHERE vendor LIKE ? AND product LIKE ?",
        )
        .bind(vendor)
        .bind(product)
        .fetch_all(&self.pool)
        .await?;

        let (mut active, mut deprecated) = (Vec::new(), Vec::new());
        for (cpe_uri, is_deprecated) in rows {
            if is_deprecated {
                deprecated.push(cpe_uri);
            } else {
                active.push(cpe_uri);
            }
        }
        Ok((active, deprecated))
    }

    async fn replace_generation(
        &self,
        fetch_type: FetchType,
        entries: &[CpeEntry],
        progress: Option<&dyn ReplaceProgress>,
    ) -> DictionaryResult<()> {
        let replace_err = |phase, source| DictionaryError::Replace {
            phase,
            fetch_type: fetch_type.as_str(),
            source,
        };

        // One transaction spans the whole swap; only statements are chunked.
        // Dropping the transaction on any error path rolls everything back.
        let mut tx = self.pool.begin().await?;

        let old_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM cpes WHERE fetch_type = ?")
            .bind(fetch_type.as_str())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| replace_err(ReplacePhase::Delete, e))?;

        for chunk in chunk_ranges(old_ids.len(), DELETE_CHUNK_SIZE) {
            let ids = &old_ids[chunk.from..chunk.to];
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!("DELETE FROM cpes WHERE id IN ({placeholders})");
            let mut query = sqlx::query(&sql);
            for id in ids {
                query = query.bind(id);
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| replace_err(ReplacePhase::Delete, e))?;
        }

        for chunk in chunk_ranges(entries.len(), INSERT_CHUNK_SIZE) {
            let batch = &entries[chunk.from..chunk.to];
            let placeholders = vec!["(?, ?, ?, ?, ?)"; batch.len()].join(", ");
            let sql = format!(
                "INSERT INTO cpes (vendor, product, cpe_uri, deprecated, fetch_type) VALUES {placeholders}"
            );
            let mut query = sqlx::query(&sql);
            for entry in batch {
                query = query
                    .bind(&entry.vendor)
                    .bind(&entry.product)
                    .bind(&entry.cpe_uri)
                    .bind(entry.deprecated)
                    .bind(entry.fetch_type.as_str());
            }
            query
                .execute(&mut *tx)
                .await
                .map_err(|e| replace_err(ReplacePhase::Insert, e))?;

            if let Some(progress) = progress {
                progress.inserted(chunk.to);
            }
        }

        tx.commit().await?;
        tracing::debug!(
            fetch_type = %fetch_type,
            deleted = old_ids.len(),
            inserted = entries.len(),
            "Replaced dictionary generation"
        );
        Ok(())
    }

    async fn is_deprecated(&self, cpe_uri: &str) -> DictionaryResult<bool> {
        let deprecated: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM cpes WHERE cpe_uri = ? AND deprecated = 1)",
        )
        .bind(cpe_uri)
        .fetch_one(&self.pool)
        .await?;
        Ok(deprecated)
    }

    async fn health_check(&self) -> DictionaryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) -> DictionaryResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
-- Dictionary entries
CREATE TABLE IF NOT EXISTS cpes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    vendor TEXT NOT NULL,
    product TEXT NOT NULL,
    cpe_uri TEXT NOT NULL CHECK (cpe_uri <> ''),
    deprecated INTEGER NOT NULL DEFAULT 0,
    fetch_type TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cpes_vendor_product ON cpes(vendor, product);
CREATE INDEX IF NOT EXISTS idx_cpes_uri ON cpes(cpe_uri);
CREATE INDEX IF NOT EXISTS idx_cpes_fetch_type ON cpes(fetch_type);

-- Fetch metadata (single row)
CREATE TABLE IF NOT EXISTS fetch_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    revision TEXT NOT NULL,
    schema_version INTEGER NOT NULL,
    last_fetched_at TEXT NOT NULL
);
"#;
