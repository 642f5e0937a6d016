//! CPE dictionary entry types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bulk source category an entry was fetched from.
///
/// Every entry belongs to exactly one fetch type; a generation replace swaps
/// all entries sharing a tag in one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchType {
    /// NVD CPE dictionary feed.
    Nvd,
    /// JVN product dictionary feed.
    Jvn,
}

impl FetchType {
    /// Tag string stored in the `fetch_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nvd => "nvd",
            Self::Jvn => "jvn",
        }
    }
}

impl fmt::Display for FetchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "nvd" => Ok(Self::Nvd),
            "jvn" => Ok(Self::Jvn),
            other => Err(crate::Error::UnknownFetchType(other.to_string())),
        }
    }
}

/// A single dictionary entry: one CPE identifier for a vendor/product pair.
///
/// Entries arrive already parsed from the feed collaborator; the storage
/// layer performs no field-level validation beyond column constraints.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpeEntry {
    pub vendor: String,
    pub product: String,
    /// Canonical CPE URI string (e.g., `cpe:/a:vendor:product:1.0`).
    pub cpe_uri: String,
    /// Whether this identifier has been superseded upstream.
    #[serde(default)]
    pub deprecated: bool,
    pub fetch_type: FetchType,
}

/// Join a vendor and product into the `"vendor::product"` listing format.
///
/// Display and indexing layers depend on this exact separator.
pub fn vendor_product(vendor: &str, product: &str) -> String {
    format!("{vendor}::{product}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_type_round_trip() {
        for fetch_type in [FetchType::Nvd, FetchType::Jvn] {
            assert_eq!(fetch_type.as_str().parse::<FetchType>().unwrap(), fetch_type);
        }
    }

    #[test]
    fn test_fetch_type_unknown() {
        let err = "redis".parse::<FetchType>().unwrap_err();
        assert!(err.to_string().contains("unknown fetch type: redis"));
    }

    #[test]
    fn test_vendor_product_format() {
        assert_eq!(vendor_product("apache", "http_server"), "apache::http_server");
    }

    #[test]
    fn test_entry_json_round_trip() {
        let entry = CpeEntry {
            vendor: "apache".to_string(),
            product: "http_server".to_string(),
            cpe_uri: "cpe:/a:apache:http_server:2.4".to_string(),
            deprecated: false,
            fetch_type: FetchType::Nvd,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""fetch_type":"nvd""#));
        let back: CpeEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_entry_deprecated_defaults_false() {
        let entry: CpeEntry = serde_json::from_str(
            r#"{"vendor":"v","product":"p","cpe_uri":"cpe:/a:v:p","fetch_type":"jvn"}"#,
        )
        .unwrap();
        assert!(!entry.deprecated);
    }
}
