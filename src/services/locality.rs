//! Reads that prefer replicas close to this host.

use crate::{
    client::{ByteRange, ByteStream},
    errors::{FsError, FsResult},
    models::SwiftPath,
    services::fs_store::SwiftFileSystemStore,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

static QUOTED_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""\S+?""#).expect("quoted literal pattern is valid"));

impl SwiftFileSystemStore {
    /// Open the whole object for reading. The returned stream must be
    /// dropped promptly to release the connection.
    pub async fn get_object(&self, path: &SwiftPath) -> FsResult<ByteStream> {
        self.read_object(path, None).await
    }

    /// Open `length` bytes starting at `offset`.
    pub async fn get_object_range(
        &self,
        path: &SwiftPath,
        offset: u64,
        length: u64,
    ) -> FsResult<ByteStream> {
        self.read_object(path, Some(ByteRange { offset, length }))
            .await
    }

    /// Physical endpoints holding the object, as reported by the store.
    pub async fn object_location(&self, path: &SwiftPath) -> FsResult<Vec<Url>> {
        let object = self.translator.to_object_path(path);
        let body = self.client.object_location(&object).await?;
        if body.is_empty() {
            return Ok(Vec::new());
        }
        extract_urls(&String::from_utf8_lossy(&body))
    }

    async fn read_object(&self, path: &SwiftPath, range: Option<ByteRange>) -> FsResult<ByteStream> {
        for url in self.data_local_endpoints(path).await? {
            debug!(%path, %url, "reading from location");
            match self.client.get_data_from_url(&url, true, range).await {
                Ok(stream) => return Ok(stream),
                Err(err) => debug!(%url, error = %err, "endpoint read failed"),
            }
        }
        debug!(%path, "reading from proxy node");
        let object = self.translator.to_object_path(path);
        self.client.get_data(&object, true, range).await
    }

    /// Endpoints sharing at least the top-level rack with this host,
    /// closest first.
    async fn data_local_endpoints(&self, path: &SwiftPath) -> FsResult<Vec<Url>> {
        let host_rack = self.racks.resolve(&self.settings.local_host);
        let mut ranked: Vec<(usize, Url)> = self
            .object_location(path)
            .await?
            .into_iter()
            .filter_map(|url| {
                let rack = self.racks.resolve(url.host_str()?);
                let score = rack_similarity(&rack, &host_rack);
                (score > 0).then_some((score, url))
            })
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ranked.into_iter().map(|(_, url)| url).collect())
    }
}

/// Number of leading rack path components two racks share.
/// `/dc1/r1` and `/dc1/r2` score 1; racks in different top-level groups
/// score 0.
pub fn rack_similarity(rack_a: &str, rack_b: &str) -> usize {
    let a = rack_a.trim_end_matches('/').split('/').skip(1);
    let b = rack_b.trim_end_matches('/').split('/').skip(1);
    a.zip(b).take_while(|(x, y)| x == y).count()
}

/// Every quoted literal in `body`, parsed as a URL.
pub fn extract_urls(body: &str) -> FsResult<Vec<Url>> {
    QUOTED_LITERAL
        .find_iter(body)
        .map(|found| {
            let literal = found.as_str();
            let literal = &literal[1..literal.len() - 1];
            Url::parse(literal).map_err(|err| {
                FsError::Protocol(format!("could not convert \"{literal}\" into a URI: {err}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn similarity_counts_shared_components() {
        assert_eq!(rack_similarity("/dc1/rack1/n1", "/dc1/rack1/n1"), 3);
        assert_eq!(rack_similarity("/dc1/rack1", "/dc1/rack2"), 1);
        assert_eq!(rack_similarity("/dc1/rack1", "/dc2/rack1"), 0);
        assert_eq!(rack_similarity("/dc1/rack1/", "/dc1/rack1"), 2);
        assert_eq!(rack_similarity("", "/dc1"), 0);
    }

    #[test]
    fn extracts_quoted_urls() {
        let urls = extract_urls(
            r#"["http://10.0.0.1:6000/sda1/2/AUTH_a/data/x", "http://10.0.0.2:6000/sdb1/2/AUTH_a/data/x"]"#,
        )
        .unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1].host_str(), Some("10.0.0.2"));
        assert!(extract_urls("[]").unwrap().is_empty());
    }

    #[test]
    fn unparseable_literal_is_a_protocol_error() {
        assert!(matches!(
            extract_urls(r#"["not-a-url"]"#),
            Err(FsError::Protocol(_))
        ));
    }
}
