//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown fetch type: {0} (expected one of: nvd, jvn)")]
    UnknownFetchType(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
