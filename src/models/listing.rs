//! JSON container listings as returned by the object store.

use crate::errors::FsResult;
use serde::{Deserialize, Serialize};

/// One element of a `format=json` listing.
///
/// Real objects carry `name`; delimiter roll-ups carry only `subdir`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

impl ListingEntry {
    pub fn object(name: impl Into<String>, bytes: u64) -> Self {
        Self {
            name: Some(name.into()),
            bytes: Some(bytes),
            ..Self::default()
        }
    }

    pub fn subdir(name: impl Into<String>) -> Self {
        Self {
            subdir: Some(name.into()),
            ..Self::default()
        }
    }

    /// The entry's key: `name` for objects, `subdir` for roll-ups.
    pub fn key(&self) -> Option<&str> {
        self.name.as_deref().or(self.subdir.as_deref())
    }
}

/// Decode a raw listing body; malformed JSON is a protocol error.
pub fn parse_listing(body: &[u8]) -> FsResult<Vec<ListingEntry>> {
    Ok(serde_json::from_slice(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FsError;

    #[test]
    fn parses_objects_and_subdirs() {
        let body = br#"[{"name":"a/x","bytes":3,"hash":"h","content_type":"text/plain"},{"subdir":"a/b/"}]"#;
        let entries = parse_listing(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key(), Some("a/x"));
        assert_eq!(entries[0].bytes, Some(3));
        assert_eq!(entries[1].key(), Some("a/b/"));
        assert!(entries[1].name.is_none());
    }

    #[test]
    fn malformed_listing_is_protocol_error() {
        assert!(matches!(parse_listing(b"{not json"), Err(FsError::Protocol(_))));
    }
}
