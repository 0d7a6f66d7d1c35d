//! The seam between the filesystem layer and the object store.
//!
//! [`StoreClient`] is the whole contract the layer needs from a transport:
//! raw headers, raw listing bytes and byte streams. Authentication, retries
//! and connection pooling live behind it.

pub mod topology;

use crate::{errors::FsResult, models::ObjectPath};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::io;
use url::Url;

pub use topology::{DEFAULT_RACK, RackResolver, TableRackResolver};

pub const X_CONTAINER_OBJECT_COUNT: &str = "X-Container-Object-Count";
pub const X_CONTAINER_BYTES_USED: &str = "X-Container-Bytes-Used";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const LAST_MODIFIED: &str = "Last-Modified";
pub const ETAG: &str = "ETag";
pub const X_OBJECT_MANIFEST: &str = "X-Object-Manifest";

/// Status a store reports for an empty container listing.
pub const NO_CONTENT: u16 = 204;

/// Object payload handed to the caller. Dropping it releases the
/// underlying connection.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Header names compare case-insensitively.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

pub fn header_value<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.is(name))
        .map(|header| header.value.as_str())
}

/// Inclusive start, byte count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

/// Operations the filesystem layer issues against the object store.
///
/// Implementations report a missing object as `FsError::NotFound` and an
/// unexpected HTTP status as `FsError::BadResponse`.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// HEAD an object, or the container when the key is empty. `newest`
    /// asks the store to bypass stale replicas.
    async fn head(&self, path: &ObjectPath, newest: bool) -> FsResult<Vec<Header>>;

    async fn get_data(
        &self,
        path: &ObjectPath,
        newest: bool,
        range: Option<ByteRange>,
    ) -> FsResult<ByteStream>;

    /// Read directly from one physical endpoint.
    async fn get_data_from_url(
        &self,
        url: &Url,
        newest: bool,
        range: Option<ByteRange>,
    ) -> FsResult<ByteStream>;

    async fn upload(
        &self,
        path: &ObjectPath,
        data: ByteStream,
        length: u64,
        headers: &[Header],
    ) -> FsResult<()>;

    /// Zero-length PUT, used for directory markers.
    async fn put_empty(&self, path: &ObjectPath) -> FsResult<()>;

    async fn delete(&self, path: &ObjectPath) -> FsResult<bool>;

    /// Server-side copy. `Ok(false)` means the store refused it.
    async fn copy(&self, src: &ObjectPath, dst: &ObjectPath) -> FsResult<bool>;

    /// Flat `format=json` listing of keys starting with `prefix`.
    ///
    /// With `add_trailing_slash` a `/` is appended to a non-empty prefix.
    /// Without `deep` the store rolls keys up at the next `/` into
    /// `subdir` entries.
    async fn list(
        &self,
        prefix: &ObjectPath,
        deep: bool,
        add_trailing_slash: bool,
    ) -> FsResult<Bytes>;

    /// Raw body naming the physical endpoint URLs that hold the object.
    async fn object_location(&self, path: &ObjectPath) -> FsResult<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let headers = vec![
            Header::new("content-length", "12"),
            Header::new("X-Object-Manifest", "data/big/"),
        ];
        assert_eq!(header_value(&headers, CONTENT_LENGTH), Some("12"));
        assert_eq!(header_value(&headers, "x-object-manifest"), Some("data/big/"));
        assert_eq!(header_value(&headers, LAST_MODIFIED), None);
    }
}
