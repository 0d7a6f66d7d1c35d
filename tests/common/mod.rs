#![allow(dead_code)]

//! Scripted in-memory object store for driving the filesystem layer.
//!
//! Keeps one container, answers listings the way a Swift proxy does and
//! records every request so tests can assert on ordering.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::{StreamExt, stream};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::{Arc, Mutex},
};
use swiftfs::{
    FsError, FsResult, StoreSettings, SwiftFileSystemStore,
    client::{
        ByteRange, ByteStream, CONTENT_LENGTH, Header, LAST_MODIFIED, NO_CONTENT, RackResolver,
        StoreClient, TableRackResolver, X_CONTAINER_BYTES_USED, X_CONTAINER_OBJECT_COUNT,
        X_OBJECT_MANIFEST, header_value,
    },
    models::{ListingEntry, ObjectPath, SwiftPath},
};
use url::Url;

pub const ROOT: &str = "swift://data.test/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Head(String),
    Get(String),
    GetUrl(String),
    Upload(String),
    PutEmpty(String),
    Delete(String),
    Copy(String, String),
    List { prefix: String, deep: bool },
    Location(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Upload(_) | Call::PutEmpty(_) | Call::Delete(_) | Call::Copy(..)
        )
    }
}

#[derive(Clone, Debug)]
pub struct MockObject {
    pub data: Vec<u8>,
    pub manifest: Option<String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, MockObject>,
    calls: Vec<Call>,
    /// Keys removed by "another client": copy and delete report NotFound.
    vanished: HashSet<String>,
    failing_copies: HashSet<String>,
    /// Listing prefix to the status it fails with.
    listing_failures: HashMap<String, u16>,
    location: Option<String>,
    failing_urls: HashSet<String>,
}

#[derive(Default)]
pub struct MockStore {
    state: Mutex<State>,
}

pub fn modified_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 4, 10, 2, 11).unwrap()
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: &str, data: &[u8]) {
        self.put_object(key, data.to_vec(), None);
    }

    pub fn insert_dir(&self, key: &str) {
        let key = if key.ends_with('/') {
            key.to_string()
        } else {
            format!("{key}/")
        };
        self.put_object(&key, Vec::new(), None);
    }

    pub fn insert_manifest(&self, key: &str, manifest: &str) {
        self.put_object(key, Vec::new(), Some(manifest.to_string()));
    }

    fn put_object(&self, key: &str, data: Vec<u8>, manifest: Option<String>) {
        self.state.lock().unwrap().objects.insert(
            key.to_string(),
            MockObject {
                data,
                manifest,
                last_modified: modified_at(),
            },
        );
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().unwrap().objects.keys().cloned().collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().unwrap().objects.contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<MockObject> {
        self.state.lock().unwrap().objects.get(key).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// The object disappears behind our back: copying or deleting it
    /// reports NotFound.
    pub fn vanish(&self, key: &str) {
        self.state.lock().unwrap().vanished.insert(key.to_string());
    }

    pub fn fail_copy(&self, key: &str) {
        self.state.lock().unwrap().failing_copies.insert(key.to_string());
    }

    pub fn fail_listing(&self, prefix: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .listing_failures
            .insert(prefix.to_string(), status);
    }

    pub fn set_location(&self, body: &str) {
        self.state.lock().unwrap().location = Some(body.to_string());
    }

    pub fn fail_url(&self, url: &str) {
        self.state.lock().unwrap().failing_urls.insert(url.to_string());
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn segments<'a>(objects: &'a BTreeMap<String, MockObject>, manifest: &str) -> Vec<&'a MockObject> {
        let prefix = manifest.split_once('/').map(|(_, p)| p).unwrap_or_default();
        objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, object)| object)
            .collect()
    }

    fn body_of(objects: &BTreeMap<String, MockObject>, object: &MockObject) -> Vec<u8> {
        match &object.manifest {
            Some(manifest) => Self::segments(objects, manifest)
                .into_iter()
                .flat_map(|segment| segment.data.clone())
                .collect(),
            None => object.data.clone(),
        }
    }
}

fn missing(path: &ObjectPath) -> FsError {
    FsError::not_found(format!("no object {path}"))
}

fn slice(data: Vec<u8>, range: Option<ByteRange>) -> Vec<u8> {
    match range {
        Some(range) => {
            let start = (range.offset as usize).min(data.len());
            let end = (start + range.length as usize).min(data.len());
            data[start..end].to_vec()
        }
        None => data,
    }
}

fn once(data: Vec<u8>) -> ByteStream {
    stream::once(async move { Ok(Bytes::from(data)) }).boxed()
}

#[async_trait]
impl StoreClient for MockStore {
    async fn head(&self, path: &ObjectPath, _newest: bool) -> FsResult<Vec<Header>> {
        self.record(Call::Head(path.key().to_string()));
        let state = self.state.lock().unwrap();
        if path.is_root() {
            let bytes: usize = state.objects.values().map(|o| o.data.len()).sum();
            return Ok(vec![
                Header::new(X_CONTAINER_OBJECT_COUNT, state.objects.len().to_string()),
                Header::new(X_CONTAINER_BYTES_USED, bytes.to_string()),
            ]);
        }
        let object = state.objects.get(path.key()).ok_or_else(|| missing(path))?;
        let length = MockStore::body_of(&state.objects, object).len();
        let mut headers = vec![
            Header::new(CONTENT_LENGTH, length.to_string()),
            Header::new(
                LAST_MODIFIED,
                object
                    .last_modified
                    .format("%a, %d %b %Y %H:%M:%S GMT")
                    .to_string(),
            ),
        ];
        if let Some(manifest) = &object.manifest {
            headers.push(Header::new(X_OBJECT_MANIFEST, manifest.clone()));
        }
        Ok(headers)
    }

    async fn get_data(
        &self,
        path: &ObjectPath,
        _newest: bool,
        range: Option<ByteRange>,
    ) -> FsResult<ByteStream> {
        self.record(Call::Get(path.key().to_string()));
        let state = self.state.lock().unwrap();
        let object = state.objects.get(path.key()).ok_or_else(|| missing(path))?;
        Ok(once(slice(MockStore::body_of(&state.objects, object), range)))
    }

    async fn get_data_from_url(
        &self,
        url: &Url,
        _newest: bool,
        range: Option<ByteRange>,
    ) -> FsResult<ByteStream> {
        self.record(Call::GetUrl(url.to_string()));
        if self.state.lock().unwrap().failing_urls.contains(url.as_str()) {
            return Err(FsError::BadResponse {
                operation: format!("GET {url}"),
                status: 503,
            });
        }
        let body = format!("from {}", url.host_str().unwrap_or_default()).into_bytes();
        Ok(once(slice(body, range)))
    }

    async fn upload(
        &self,
        path: &ObjectPath,
        data: ByteStream,
        length: u64,
        headers: &[Header],
    ) -> FsResult<()> {
        self.record(Call::Upload(path.key().to_string()));
        let chunks: Vec<std::io::Result<Bytes>> = data.collect().await;
        let mut body = Vec::new();
        for chunk in chunks {
            body.extend_from_slice(&chunk?);
        }
        assert_eq!(body.len() as u64, length, "declared length of {path}");
        let manifest = header_value(headers, X_OBJECT_MANIFEST).map(str::to_string);
        self.put_object(path.key(), body, manifest);
        Ok(())
    }

    async fn put_empty(&self, path: &ObjectPath) -> FsResult<()> {
        self.record(Call::PutEmpty(path.key().to_string()));
        self.put_object(path.key(), Vec::new(), None);
        Ok(())
    }

    async fn delete(&self, path: &ObjectPath) -> FsResult<bool> {
        self.record(Call::Delete(path.key().to_string()));
        let mut state = self.state.lock().unwrap();
        if state.vanished.contains(path.key()) {
            state.objects.remove(path.key());
            return Err(missing(path));
        }
        state
            .objects
            .remove(path.key())
            .map(|_| true)
            .ok_or_else(|| missing(path))
    }

    async fn copy(&self, src: &ObjectPath, dst: &ObjectPath) -> FsResult<bool> {
        self.record(Call::Copy(src.key().to_string(), dst.key().to_string()));
        let mut state = self.state.lock().unwrap();
        if state.vanished.contains(src.key()) {
            return Err(missing(src));
        }
        if state.failing_copies.contains(src.key()) {
            return Ok(false);
        }
        let object = state.objects.get(src.key()).cloned().ok_or_else(|| missing(src))?;
        state.objects.insert(dst.key().to_string(), object);
        Ok(true)
    }

    async fn list(
        &self,
        prefix: &ObjectPath,
        deep: bool,
        add_trailing_slash: bool,
    ) -> FsResult<Bytes> {
        self.record(Call::List {
            prefix: prefix.key().to_string(),
            deep,
        });
        let state = self.state.lock().unwrap();
        if let Some(status) = state.listing_failures.get(prefix.key()) {
            return Err(match status {
                404 => missing(prefix),
                status => FsError::BadResponse {
                    operation: format!("list {prefix}"),
                    status: *status,
                },
            });
        }

        let mut key_prefix = prefix.key().to_string();
        if add_trailing_slash && !key_prefix.is_empty() && !key_prefix.ends_with('/') {
            key_prefix.push('/');
        }
        let matching: Vec<_> = state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(&key_prefix))
            .collect();
        if matching.is_empty() && key_prefix.is_empty() {
            return Err(FsError::BadResponse {
                operation: "list container".to_string(),
                status: NO_CONTENT,
            });
        }

        let mut entries = Vec::new();
        let mut subdirs = BTreeSet::new();
        for (key, object) in matching {
            let rest = &key[key_prefix.len()..];
            if !deep {
                if let Some(pos) = rest.find('/') {
                    subdirs.insert(format!("{}{}", key_prefix, &rest[..=pos]));
                    continue;
                }
            }
            entries.push(ListingEntry::object(key.clone(), object.data.len() as u64));
        }
        entries.extend(subdirs.into_iter().map(ListingEntry::subdir));
        entries.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(Bytes::from(serde_json::to_vec(&entries).unwrap()))
    }

    async fn object_location(&self, path: &ObjectPath) -> FsResult<Bytes> {
        self.record(Call::Location(path.key().to_string()));
        let body = self.state.lock().unwrap().location.clone();
        Ok(Bytes::from(body.unwrap_or_else(|| "[]".to_string())))
    }
}

pub fn filesystem(mock: &Arc<MockStore>) -> SwiftFileSystemStore {
    filesystem_with_racks(mock, TableRackResolver::default(), "127.0.0.1")
}

pub fn filesystem_with_racks(
    mock: &Arc<MockStore>,
    racks: TableRackResolver,
    local_host: &str,
) -> SwiftFileSystemStore {
    let settings = StoreSettings {
        local_host: local_host.to_string(),
        ..StoreSettings::default()
    };
    let racks: Arc<dyn RackResolver> = Arc::new(racks);
    SwiftFileSystemStore::new(ROOT, mock.clone(), racks, settings).unwrap()
}

pub fn p(path: &str) -> SwiftPath {
    SwiftPath::parse(path).unwrap()
}

pub async fn read_all(data: ByteStream) -> Vec<u8> {
    let chunks: Vec<std::io::Result<Bytes>> = data.collect().await;
    chunks
        .into_iter()
        .flat_map(|chunk| chunk.unwrap().to_vec())
        .collect()
}

pub fn body(data: &[u8]) -> (ByteStream, u64) {
    (once(data.to_vec()), data.len() as u64)
}
