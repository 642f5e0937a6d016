//! Core domain types and shared logic for the cpedict CPE dictionary.
//!
//! This crate defines the canonical data model used across all other crates:
//! - CPE dictionary entries and their fetch-source category
//! - Build identity (tool revision and schema version)
//! - Configuration for the dictionary backends and the lookup server

pub mod config;
pub mod cpe;
pub mod error;
pub mod version;

pub use config::{AppConfig, DictionaryConfig, ServerConfig};
pub use cpe::{CpeEntry, FetchType, vendor_product};
pub use error::{Error, Result};
pub use version::BuildInfo;

/// Identifiers deleted per DELETE statement during a generation replace.
pub const DELETE_CHUNK_SIZE: usize = 10_000;

/// Rows inserted per INSERT statement during a generation replace.
pub const INSERT_CHUNK_SIZE: usize = 2_000;

/// Schema version stamped into the fetch metadata row by this build.
pub const LATEST_SCHEMA_VERSION: i64 = 2;
