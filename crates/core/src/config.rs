//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Lookup server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Dictionary backend configuration.
    #[serde(default)]
    pub dictionary: DictionaryConfig,
}

/// Lookup server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:1323").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:1323".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Dictionary backend configuration.
///
/// Selects the storage dialect and its connection target. Any dialect value
/// outside this set fails at deserialization time, before a driver is built.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DictionaryConfig {
    /// Embedded single-file SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Seconds to wait on a locked database before reporting contention.
        #[serde(default = "default_busy_timeout_secs")]
        busy_timeout_secs: u64,
        /// Log every SQL statement at debug level.
        #[serde(default)]
        log_queries: bool,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// Prefer the CPEDICT_DICTIONARY__PASSWORD env var over the config file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds; PostgreSQL cancels queries
        /// exceeding it.
        #[serde(default)]
        statement_timeout_ms: Option<u64>,
        /// Log every SQL statement at debug level.
        #[serde(default)]
        log_queries: bool,
    },
}

fn default_busy_timeout_secs() -> u64 {
    5
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./cpe.sqlite3"),
            busy_timeout_secs: default_busy_timeout_secs(),
            log_queries: false,
        }
    }
}

impl DictionaryConfig {
    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            DictionaryConfig::Sqlite { .. } => Ok(()),
            DictionaryConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => {
                    Err("postgres config requires either 'url' or 'host' + 'database'".to_string())
                }
                (None, Some(_), None) => {
                    Err("postgres config requires 'database' when using individual fields"
                        .to_string())
                }
            },
        }
    }

    /// Dialect name for log and error context.
    pub fn dialect(&self) -> &'static str {
        match self {
            DictionaryConfig::Sqlite { .. } => "sqlite",
            DictionaryConfig::Postgres { .. } => "postgres",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sqlite() {
        let config = DictionaryConfig::default();
        assert_eq!(config.dialect(), "sqlite");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_postgres_requires_target() {
        let config = DictionaryConfig::Postgres {
            url: None,
            host: None,
            port: default_pg_port(),
            username: None,
            password: None,
            database: None,
            max_connections: default_max_connections(),
            statement_timeout_ms: None,
            log_queries: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_host_without_database_rejected() {
        let config = DictionaryConfig::Postgres {
            url: None,
            host: Some("localhost".to_string()),
            port: default_pg_port(),
            username: None,
            password: None,
            database: None,
            max_connections: default_max_connections(),
            statement_timeout_ms: None,
            log_queries: false,
        };
        assert!(config.validate().unwrap_err().contains("database"));
    }

    #[test]
    fn test_unknown_dialect_fails_deserialization() {
        let raw = r#"{"type": "redis", "path": "./cpe.db"}"#;
        assert!(serde_json::from_str::<DictionaryConfig>(raw).is_err());
    }
}
