//! Dictionary storage engine for cpedict.
//!
//! This crate provides the storage core:
//! - [`DictionaryStore`]: the capability set every backend implements
//! - [`SqliteStore`] / [`PostgresStore`]: the relational backends
//! - [`from_config`]: the open sequence (dialect selection, lock detection,
//!   legacy-schema refusal, migration)
//! - the chunked, single-transaction generation replace protocol

pub mod chunk;
pub mod error;
pub mod models;
pub mod postgres;
pub mod store;

pub use chunk::{IndexChunk, chunk_ranges};
pub use error::{DictionaryError, DictionaryResult, ReplacePhase};
pub use models::FetchMetaRow;
pub use postgres::PostgresStore;
pub use store::{DictionaryStore, ReplaceProgress, SqliteStore};

use cpedict_core::DictionaryConfig;
use std::sync::Arc;

/// Open a dictionary store from configuration.
///
/// Runs the full open sequence: build the backend for the configured
/// dialect, detect open-time lock contention ([`DictionaryError::Locked`],
/// retryable by the caller; no retry happens here), refuse a pre-versioning
/// store ([`DictionaryError::LegacySchema`]), then migrate. No partial state
/// survives a failure; dropping the store closes its pool.
pub async fn from_config(
    config: &DictionaryConfig,
) -> DictionaryResult<Arc<dyn DictionaryStore>> {
    config.validate().map_err(DictionaryError::Config)?;

    let store: Arc<dyn DictionaryStore> = match config {
        DictionaryConfig::Sqlite {
            path,
            busy_timeout_secs,
            log_queries,
        } => Arc::new(SqliteStore::new(path, *busy_timeout_secs, *log_queries).await?),
        DictionaryConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            max_connections,
            statement_timeout_ms,
            log_queries,
        } => {
            let store = if let Some(url) = url {
                // URL takes precedence over individual fields.
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms, *log_queries)
                    .await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *max_connections,
                    *statement_timeout_ms,
                    *log_queries,
                )
                .await?
            } else {
                return Err(DictionaryError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Arc::new(store)
        }
    };

    if store.is_legacy_schema().await? {
        tracing::error!(
            dialect = config.dialect(),
            "Store predates schema versioning; delete the database and fetch again"
        );
        return Err(DictionaryError::LegacySchema);
    }

    store.migrate().await?;
    Ok(store)
}
