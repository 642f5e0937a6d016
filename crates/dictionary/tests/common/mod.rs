//! Shared harness for dictionary store tests.

use cpedict_core::{BuildInfo, CpeEntry, DictionaryConfig, FetchType, LATEST_SCHEMA_VERSION};
use cpedict_dictionary::DictionaryStore;
use sqlx::sqlite::SqliteConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

/// Fixed build identity so assertions don't depend on the package version.
pub fn test_build() -> BuildInfo {
    BuildInfo {
        revision: "test-revision".to_string(),
        schema_version: LATEST_SCHEMA_VERSION,
    }
}

/// A tempdir-backed SQLite dictionary. The directory lives as long as this
/// value, so stores can be closed and reopened against the same file.
pub struct TestDictionary {
    dir: TempDir,
}

impl TestDictionary {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create tempdir"),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("cpe.sqlite3")
    }

    pub fn config(&self) -> DictionaryConfig {
        DictionaryConfig::Sqlite {
            path: self.db_path(),
            busy_timeout_secs: 5,
            log_queries: false,
        }
    }

    pub async fn open(&self) -> Arc<dyn DictionaryStore> {
        cpedict_dictionary::from_config(&self.config())
            .await
            .expect("Failed to open dictionary")
    }
}

pub fn entry(
    vendor: &str,
    product: &str,
    cpe_uri: &str,
    deprecated: bool,
    fetch_type: FetchType,
) -> CpeEntry {
    CpeEntry {
        vendor: vendor.to_string(),
        product: product.to_string(),
        cpe_uri: cpe_uri.to_string(),
        deprecated,
        fetch_type,
    }
}

/// Count stored rows for a fetch type through a separate connection,
/// bypassing the store under test.
pub async fn count_rows(path: &Path, fetch_type: FetchType) -> i64 {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .expect("Failed to parse sqlite options");
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .expect("Failed to open counting connection");
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cpes WHERE fetch_type = ?")
        .bind(fetch_type.as_str())
        .fetch_one(&pool)
        .await
        .expect("Failed to count rows");
    pool.close().await;
    count
}
