//! Database models mapping to the dictionary schema.

use cpedict_core::BuildInfo;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Fetch metadata record. At most one logical row exists (id = 1).
#[derive(Debug, Clone, FromRow)]
pub struct FetchMetaRow {
    pub id: i64,
    /// Revision of the build that last wrote the store.
    pub revision: String,
    /// Schema version the store was written with.
    pub schema_version: i64,
    pub last_fetched_at: OffsetDateTime,
}

impl FetchMetaRow {
    /// Fresh metadata for a store that has never been fetched into,
    /// stamped from the running build.
    pub fn initial(build: &BuildInfo) -> Self {
        Self {
            id: 1,
            revision: build.revision.clone(),
            schema_version: build.schema_version,
            last_fetched_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// Whether the stored schema version matches the running build.
    ///
    /// A mismatch is a hard compatibility failure: the store must be deleted
    /// and refetched, never upgraded in place.
    pub fn is_compatible(&self, build: &BuildInfo) -> bool {
        self.schema_version == build.schema_version
    }
}
