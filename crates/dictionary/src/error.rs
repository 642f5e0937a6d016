//! Dictionary store error types.

use std::fmt;
use thiserror::Error;

/// Phase of a generation replace that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplacePhase {
    /// Selecting or deleting the previous generation.
    Delete,
    /// Inserting the incoming batch.
    Insert,
}

impl fmt::Display for ReplacePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delete => f.write_str("delete"),
            Self::Insert => f.write_str("insert"),
        }
    }
}

/// Dictionary store operation errors.
#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The backend is held by another process. Retryable by the caller;
    /// never retried internally.
    #[error("database is locked by another process (dialect: {dialect})")]
    Locked { dialect: &'static str },

    /// The store predates schema versioning. Never migrated automatically;
    /// the legacy layout cannot be told apart from arbitrary user tables.
    #[error("incompatible schema: store predates schema versioning; delete the database and fetch again")]
    LegacySchema,

    #[error("schema migration failed: {0}")]
    Migration(#[source] sqlx::Error),

    #[error("{phase} phase failed while replacing fetch type {fetch_type}: {source}")]
    Replace {
        phase: ReplacePhase,
        fetch_type: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl DictionaryError {
    /// Whether the caller may retry after waiting (open-time contention).
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

/// Result type for dictionary operations.
pub type DictionaryResult<T> = std::result::Result<T, DictionaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_error_names_phase_and_fetch_type() {
        let err = DictionaryError::Replace {
            phase: ReplacePhase::Insert,
            fetch_type: "nvd",
            source: sqlx::Error::PoolClosed,
        };
        let msg = err.to_string();
        assert!(msg.contains("insert phase"));
        assert!(msg.contains("fetch type nvd"));
    }

    #[test]
    fn test_locked_is_retryable() {
        assert!(DictionaryError::Locked { dialect: "sqlite" }.is_locked());
        assert!(!DictionaryError::LegacySchema.is_locked());
    }
}
