//! Path to status resolution.
//!
//! A path may be backed by an object, by a directory marker (`key/`), by
//! the container itself, or by nothing but a `subdir` roll-up in a
//! listing. Resolution probes in that order.

use crate::{
    client::{
        CONTENT_LENGTH, Header, LAST_MODIFIED, X_CONTAINER_BYTES_USED, X_CONTAINER_OBJECT_COUNT,
        X_OBJECT_MANIFEST,
    },
    errors::{FsError, FsResult},
    models::{FileStatus, ObjectPath, SwiftPath, parse_listing},
    services::fs_store::SwiftFileSystemStore,
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Fields of interest pulled out of a HEAD response.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ObjectHeaders {
    pub is_container: bool,
    pub length: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub dlo_prefix: Option<ObjectPath>,
}

impl SwiftFileSystemStore {
    /// Status of `path`, asking the store for its newest copy.
    pub async fn get_object_metadata(&self, path: &SwiftPath) -> FsResult<FileStatus> {
        self.stat(path, true).await
    }

    /// Resolve `path` to a file, directory or pseudo-directory.
    ///
    /// The object form is probed first, then the directory-marker form,
    /// then the parent listing for a `subdir` roll-up. Fails with
    /// `NotFound` when none of them resolve.
    pub async fn stat(&self, path: &SwiftPath, newest: bool) -> FsResult<FileStatus> {
        let status_path = self.translator.qualify(path);
        let mut object = self.translator.to_object_path(path);

        let headers = match self.client.head(&object, newest).await {
            Ok(headers) => headers,
            Err(FsError::NotFound(_)) => {
                object = self.translator.to_dir_path(path);
                match self.client.head(&object, newest).await {
                    Ok(headers) => headers,
                    Err(FsError::NotFound(_)) => Vec::new(),
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        if headers.is_empty() {
            if self.exists_pseudo_directory(&object).await {
                return Ok(FileStatus::pseudo_directory(status_path));
            }
            return Err(FsError::not_found(format!("Not Found {path}")));
        }

        let parsed = parse_object_headers(&headers)?;
        let modified = parsed.last_modified.unwrap_or_else(Utc::now);
        if parsed.is_container || object.is_root() || object.key().ends_with('/') {
            if parsed.dlo_prefix.is_some() {
                debug!(%path, "ignoring manifest header on a directory");
            }
            return Ok(FileStatus::directory(status_path, self.block_size(), modified));
        }
        Ok(FileStatus::file(
            status_path,
            parsed.length,
            self.block_size(),
            modified,
            parsed.dlo_prefix,
        ))
    }

    /// Whether the parent listing rolls up a `subdir` equal to `path/`.
    ///
    /// Any listing failure reads as "does not exist".
    async fn exists_pseudo_directory(&self, path: &ObjectPath) -> bool {
        let (probe, dir_name) = if path.key().ends_with('/') {
            (path.without_trailing_slash(), path.key().to_string())
        } else {
            (path.clone(), format!("{}/", path.key()))
        };
        let entries = match self.client.list(&probe, false, false).await {
            Ok(body) => match parse_listing(&body) {
                Ok(entries) => entries,
                Err(err) => {
                    debug!(%probe, error = %err, "unreadable listing during pseudo-directory probe");
                    return false;
                }
            },
            Err(err) => {
                debug!(%probe, error = %err, "listing failed during pseudo-directory probe");
                return false;
            }
        };
        entries
            .iter()
            .any(|entry| entry.subdir.as_deref() == Some(dir_name.as_str()))
    }
}

pub(crate) fn parse_object_headers(headers: &[Header]) -> FsResult<ObjectHeaders> {
    let mut parsed = ObjectHeaders::default();
    for header in headers {
        if header.is(X_CONTAINER_OBJECT_COUNT) || header.is(X_CONTAINER_BYTES_USED) {
            parsed.is_container = true;
        } else if header.is(CONTENT_LENGTH) {
            parsed.length = header.value.trim().parse().map_err(|_| {
                FsError::Protocol(format!("invalid Content-Length `{}`", header.value))
            })?;
        } else if header.is(LAST_MODIFIED) {
            parsed.last_modified = Some(parse_last_modified(&header.value)?);
        } else if header.is(X_OBJECT_MANIFEST) {
            parsed.dlo_prefix = parse_manifest(&header.value);
        }
    }
    if parsed.is_container {
        parsed.length = 0;
    }
    Ok(parsed)
}

/// Parse `EEE, d MMM yyyy HH:mm:ss zzz`, e.g. `Tue, 4 Jun 2024 10:02:11 GMT`.
pub fn parse_last_modified(value: &str) -> FsResult<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|err| FsError::Protocol(format!("failed to parse Last-Modified `{value}`: {err}")))
}

/// Split a manifest value `container/key-prefix` on its first `/`.
pub fn parse_manifest(value: &str) -> Option<ObjectPath> {
    let (container, prefix) = value.trim().split_once('/')?;
    if container.is_empty() {
        return None;
    }
    Some(ObjectPath::new(container, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_http_dates() {
        let date = parse_last_modified("Tue, 4 Jun 2024 10:02:11 GMT").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 6, 4));
        assert_eq!((date.hour(), date.minute(), date.second()), (10, 2, 11));
        assert!(parse_last_modified("Wed, 12 Jun 2024 23:59:59 GMT").is_ok());
    }

    #[test]
    fn malformed_date_is_a_protocol_error() {
        assert!(matches!(
            parse_last_modified("yesterday"),
            Err(FsError::Protocol(_))
        ));
    }

    #[test]
    fn manifest_splits_on_first_slash() {
        let prefix = parse_manifest("data/big/file/").unwrap();
        assert_eq!(prefix.container(), "data");
        assert_eq!(prefix.key(), "big/file/");
        assert!(parse_manifest("no-slash").is_none());
        assert!(parse_manifest("/key").is_none());
    }

    #[test]
    fn container_headers_mark_a_directory() {
        let parsed = parse_object_headers(&[
            Header::new(X_CONTAINER_OBJECT_COUNT, "3"),
            Header::new(CONTENT_LENGTH, "77"),
        ])
        .unwrap();
        assert!(parsed.is_container);
        assert_eq!(parsed.length, 0);
    }

    #[test]
    fn object_headers_carry_length_date_and_manifest() {
        let parsed = parse_object_headers(&[
            Header::new("content-length", "42"),
            Header::new(LAST_MODIFIED, "Tue, 4 Jun 2024 10:02:11 GMT"),
            Header::new(X_OBJECT_MANIFEST, "data/seg/"),
        ])
        .unwrap();
        assert!(!parsed.is_container);
        assert_eq!(parsed.length, 42);
        assert!(parsed.last_modified.is_some());
        assert_eq!(parsed.dlo_prefix, Some(ObjectPath::new("data", "seg/")));
    }

    #[test]
    fn bad_content_length_is_rejected() {
        assert!(parse_object_headers(&[Header::new(CONTENT_LENGTH, "lots")]).is_err());
    }
}
