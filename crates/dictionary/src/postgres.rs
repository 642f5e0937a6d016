//! PostgreSQL-based dictionary store implementation.

use crate::chunk::chunk_ranges;
use crate::error::{DictionaryError, DictionaryResult, ReplacePhase};
use crate::models::FetchMetaRow;
use crate::store::{DictionaryStore, ReplaceProgress};
use async_trait::async_trait;
use cpedict_core::{BuildInfo, CpeEntry, FetchType, vendor_product};
use cpedict_core::{DELETE_CHUNK_SIZE, INSERT_CHUNK_SIZE};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, Pool, Postgres};
use std::str::FromStr;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

/// PostgreSQL rejects multiple statements in one prepared statement, so the
/// schema is split and executed statement by statement.
fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-backed dictionary store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
        log_queries: bool,
    ) -> DictionaryResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms, log_queries).await
    }

    /// Create a store from individual connection parameters, allowing
    /// credentials to be supplied separately (e.g., password via env).
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
        log_queries: bool,
    ) -> DictionaryResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }
        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        // Log connection info without the password.
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            "Connecting to PostgreSQL"
        );

        Self::connect(opts, max_connections, statement_timeout_ms, log_queries).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
        log_queries: bool,
    ) -> DictionaryResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{timeout_ms}ms"))]);
        }
        if !log_queries {
            opts = opts.disable_statement_logging();
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl DictionaryStore for PostgresStore {
    async fn migrate(&self) -> DictionaryResult<()> {
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(DictionaryError::Migration)?;
        }
        Ok(())
    }

    async fn is_legacy_schema(&self) -> DictionaryResult<bool> {
        let has_meta: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_schema = 'public' AND table_name = 'fetch_meta')",
        )
        .fetch_one(&self.pool)
        .await?;
        if has_meta {
            return Ok(false);
        }

        let tables: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pg_tables WHERE schemaname = 'public'")
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
            VALUES (1, $1, $2, $3)
            ON CONFLICT(id) DO UPDATE SET
                revision = EXCLUDED.revision,
                schema_version = EXCLUDED.schema_version,
                last_fetched_at = EXCLUDED.last_fetched_at
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
            "SELECT DISTINCT cpe_uri, deprecated FROM cpes WHERE vendor LIKE $1 AND product LIKE $2",
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

        let mut tx = self.pool.begin().await?;

        let old_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM cpes WHERE fetch_type = $1")
            .bind(fetch_type.as_str())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| replace_err(ReplacePhase::Delete, e))?;

        for chunk in chunk_ranges(old_ids.len(), DELETE_CHUNK_SIZE) {
            let ids = &old_ids[chunk.from..chunk.to];
            // DELETE ... WHERE id = ANY($1) keeps the statement at one
            // parameter regardless of chunk width.
            sqlx::query("DELETE FROM cpes WHERE id = ANY($1)")
                .bind(ids)
                .execute(&mut *tx)
                .await
                .map_err(|e| replace_err(ReplacePhase::Delete, e))?;
        }

        for chunk in chunk_ranges(entries.len(), INSERT_CHUNK_SIZE) {
            let batch = &entries[chunk.from..chunk.to];
            let placeholders: Vec<String> = (0..batch.len())
                .map(|i| {
                    let base = i * 5;
                    format!(
                        "(${}, ${}, ${}, ${}, ${})",
                        base + 1,
                        base + 2,
                        base + 3,
                        base + 4,
                        base + 5
                    )
                })
                .collect();
            let sql = format!(
                "INSERT INTO cpes (vendor, product, cpe_uri, deprecated, fetch_type) VALUES {}",
                placeholders.join(", ")
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
            "SELECT EXISTS(SELECT 1 FROM cpes WHERE cpe_uri = $1 AND deprecated)",
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_splits_into_clean_statements() {
        let statements = postgres_schema_statements(POSTGRES_SCHEMA);
        assert!(!statements.is_empty());
        for statement in statements {
            assert!(!statement.is_empty());
            assert!(!statement.ends_with(';'));
        }
    }
}
