//! Build identity stamped into the fetch metadata row.

use serde::{Deserialize, Serialize};

/// Revision and schema version of a build.
///
/// Passed explicitly into metadata-stamping operations rather than read from
/// globals, so tests can inject fixed values. The stored values always come
/// from the build, never from callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Tool revision, e.g. `"0.2.0"` or `"0.2.0+g1a2b3c4"`.
    pub revision: String,
    /// Schema version this build reads and writes.
    pub schema_version: i64,
}

impl BuildInfo {
    /// Identity of the running build.
    ///
    /// `CPEDICT_REVISION` can be set at compile time to append a VCS
    /// identifier to the package version.
    pub fn current() -> Self {
        let revision = match option_env!("CPEDICT_REVISION") {
            Some(vcs) => format!("{}+{vcs}", env!("CARGO_PKG_VERSION")),
            None => env!("CARGO_PKG_VERSION").to_string(),
        };
        Self {
            revision,
            schema_version: crate::LATEST_SCHEMA_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_carries_latest_schema_version() {
        let build = BuildInfo::current();
        assert_eq!(build.schema_version, crate::LATEST_SCHEMA_VERSION);
        assert!(build.revision.starts_with(env!("CARGO_PKG_VERSION")));
    }
}
