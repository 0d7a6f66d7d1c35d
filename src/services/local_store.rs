//! src/services/local_store.rs
//!
//! LocalStore: a single-node object store that answers the [`StoreClient`]
//! contract from local resources. Object metadata lives in SQLite; payloads
//! live on disk sharded beneath
//! `base_path/{container}/{shard}/{shard}/{digest}`. Listings, container
//! HEADs and large-object manifests behave like a Swift proxy so the
//! filesystem layer runs unchanged against it.

use crate::{
    client::{
        ByteRange, ByteStream, CONTENT_LENGTH, ETAG, Header, LAST_MODIFIED, NO_CONTENT,
        StoreClient, X_CONTAINER_BYTES_USED, X_CONTAINER_OBJECT_COUNT, X_OBJECT_MANIFEST,
        header_value,
    },
    errors::{FsError, FsResult},
    models::{ListingEntry, ObjectPath},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use md5::Context;
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{
    collections::BTreeSet,
    io::{self, ErrorKind, SeekFrom},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS objects (
    id BLOB PRIMARY KEY,
    container TEXT NOT NULL,
    key TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    etag TEXT NOT NULL,
    manifest TEXT,
    last_modified TEXT NOT NULL,
    UNIQUE(container, key)
)";

/// Metadata row for one stored object.
#[derive(Clone, Debug, FromRow)]
pub struct StoredObject {
    pub id: Uuid,
    pub container: String,
    pub key: String,
    pub size_bytes: i64,
    pub etag: String,
    /// `container/prefix` when the object is a large-object manifest.
    pub manifest: Option<String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LocalStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,
}

impl LocalStore {
    pub fn new(db: Arc<SqlitePool>, base_path: impl Into<PathBuf>) -> Self {
        Self {
            db,
            base_path: base_path.into(),
        }
    }

    /// Open (creating if needed) the metadata database and payload root.
    pub async fn connect(database_url: &str, base_path: impl Into<PathBuf>) -> FsResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::new(Arc::new(pool), base_path);
        store.init_schema().await?;
        fs::create_dir_all(&store.base_path).await?;
        Ok(store)
    }

    pub async fn init_schema(&self) -> FsResult<()> {
        sqlx::query(SCHEMA).execute(&*self.db).await?;
        Ok(())
    }

    /// Reject keys the store refuses: empty, over-long, `..` segments or
    /// control characters.
    fn ensure_key_safe(&self, path: &ObjectPath) -> FsResult<()> {
        let key = path.key();
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.split('/').any(|segment| segment == "..")
            || key.bytes().any(|b| b.is_ascii_control());
        if invalid || path.container().is_empty() || path.container().contains('/') {
            return Err(FsError::Configuration(format!("invalid object path `{path}`")));
        }
        Ok(())
    }

    fn container_root(&self, container: &str) -> PathBuf {
        self.base_path.join(container)
    }

    /// Payload location: two shard levels from MD5(container/key), file
    /// named by the full digest so keys never collide with directories.
    fn payload_path(&self, container: &str, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}/{}", container, key));
        let mut path = self.container_root(container);
        path.push(format!("{:02x}", digest[0]));
        path.push(format!("{:02x}", digest[1]));
        path.push(format!("{:x}", digest));
        path
    }

    async fn fetch_object(&self, path: &ObjectPath) -> FsResult<StoredObject> {
        sqlx::query_as::<_, StoredObject>(
            "SELECT id, container, key, size_bytes, etag, manifest, last_modified
             FROM objects WHERE container = ? AND key = ?",
        )
        .bind(path.container())
        .bind(path.key())
        .fetch_optional(&*self.db)
        .await?
        .ok_or_else(|| FsError::not_found(format!("object `{path}` not found")))
    }

    /// Objects whose key starts with `prefix`, in key order. The key range
    /// is bounded in the query so only matching rows are read.
    async fn objects_with_prefix(&self, container: &str, prefix: &str) -> FsResult<Vec<StoredObject>> {
        let rows = match prefix_upper_bound(prefix) {
            Some(upper) => {
                sqlx::query_as::<_, StoredObject>(
                    "SELECT id, container, key, size_bytes, etag, manifest, last_modified
                     FROM objects WHERE container = ? AND key >= ? AND key < ? ORDER BY key ASC",
                )
                .bind(container)
                .bind(prefix)
                .bind(upper)
                .fetch_all(&*self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, StoredObject>(
                    "SELECT id, container, key, size_bytes, etag, manifest, last_modified
                     FROM objects WHERE container = ? AND key >= ? ORDER BY key ASC",
                )
                .bind(container)
                .bind(prefix)
                .fetch_all(&*self.db)
                .await?
            }
        };
        Ok(rows)
    }

    async fn manifest_segments(&self, manifest: &str) -> FsResult<Vec<StoredObject>> {
        let (container, prefix) = manifest.split_once('/').ok_or_else(|| {
            FsError::Protocol(format!("malformed manifest `{manifest}`"))
        })?;
        self.objects_with_prefix(container, prefix).await
    }

    /// Stream a payload into place through a temp file, returning its
    /// size and MD5 etag. The temp file is removed on any failure.
    async fn write_payload(
        &self,
        path: &ObjectPath,
        mut data: ByteStream,
        expected_len: u64,
    ) -> FsResult<(i64, String)> {
        let file_path = self.payload_path(path.container(), path.key());
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            FsError::Io(io::Error::new(
                ErrorKind::Other,
                "payload path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        let mut digest = Context::new();
        while let Some(chunk_res) = data.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(FsError::Io(err));
                }
            };
            size_bytes += chunk.len() as u64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(FsError::Io(err));
            }
        }
        if size_bytes != expected_len {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FsError::Io(io::Error::new(
                ErrorKind::InvalidData,
                format!("expected {expected_len} bytes for {path}, received {size_bytes}"),
            )));
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FsError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(FsError::Io(err));
        }
        drop(file);
        self.move_into_place(&tmp_path, &file_path).await?;

        Ok((size_bytes as i64, format!("{:x}", digest.compute())))
    }

    async fn move_into_place(&self, tmp_path: &Path, file_path: &Path) -> FsResult<()> {
        if let Err(err) = fs::rename(tmp_path, file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(file_path).await?;
                fs::rename(tmp_path, file_path).await?;
            } else {
                let _ = fs::remove_file(tmp_path).await;
                return Err(FsError::Io(err));
            }
        }
        Ok(())
    }

    /// Insert or overwrite the metadata row for `path`.
    async fn upsert_object(
        &self,
        path: &ObjectPath,
        size_bytes: i64,
        etag: &str,
        manifest: Option<&str>,
    ) -> FsResult<()> {
        sqlx::query(
            r#"
            INSERT INTO objects (id, container, key, size_bytes, etag, manifest, last_modified)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(container, key) DO UPDATE SET
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                manifest = excluded.manifest,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(path.container())
        .bind(path.key())
        .bind(size_bytes)
        .bind(etag)
        .bind(manifest)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Recursively remove empty directories up to the container root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl StoreClient for LocalStore {
    async fn head(&self, path: &ObjectPath, _newest: bool) -> FsResult<Vec<Header>> {
        if path.is_root() {
            let (count, bytes_used): (i64, i64) = sqlx::query_as(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM objects WHERE container = ?",
            )
            .bind(path.container())
            .fetch_one(&*self.db)
            .await?;
            return Ok(vec![
                Header::new(X_CONTAINER_OBJECT_COUNT, count.to_string()),
                Header::new(X_CONTAINER_BYTES_USED, bytes_used.to_string()),
            ]);
        }

        self.ensure_key_safe(path)?;
        let object = self.fetch_object(path).await?;
        let length = match &object.manifest {
            Some(manifest) => self
                .manifest_segments(manifest)
                .await?
                .iter()
                .map(|segment| segment.size_bytes)
                .sum(),
            None => object.size_bytes,
        };
        let mut headers = vec![
            Header::new(CONTENT_LENGTH, length.to_string()),
            Header::new(LAST_MODIFIED, http_date(&object.last_modified)),
            Header::new(ETAG, object.etag.clone()),
        ];
        if let Some(manifest) = object.manifest {
            headers.push(Header::new(X_OBJECT_MANIFEST, manifest));
        }
        Ok(headers)
    }

    async fn get_data(
        &self,
        path: &ObjectPath,
        _newest: bool,
        range: Option<ByteRange>,
    ) -> FsResult<ByteStream> {
        self.ensure_key_safe(path)?;
        let object = self.fetch_object(path).await?;

        if let Some(manifest) = &object.manifest {
            let mut body = Vec::new();
            for segment in self.manifest_segments(manifest).await? {
                let segment_path = self.payload_path(&segment.container, &segment.key);
                body.extend_from_slice(&fs::read(&segment_path).await?);
            }
            let body = Bytes::from(body);
            let body = match range {
                Some(range) => slice_range(&body, range),
                None => body,
            };
            return Ok(stream::once(async move { Ok(body) }).boxed());
        }

        let file_path = self.payload_path(path.container(), path.key());
        let mut file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                FsError::not_found(format!("payload of `{path}` is missing"))
            } else {
                FsError::Io(err)
            }
        })?;
        match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.offset)).await?;
                Ok(ReaderStream::new(file.take(range.length)).boxed())
            }
            None => Ok(ReaderStream::new(file).boxed()),
        }
    }

    async fn get_data_from_url(
        &self,
        url: &Url,
        _newest: bool,
        _range: Option<ByteRange>,
    ) -> FsResult<ByteStream> {
        Err(FsError::not_found(format!(
            "endpoint {url} is not served by the local store"
        )))
    }

    async fn upload(
        &self,
        path: &ObjectPath,
        data: ByteStream,
        length: u64,
        headers: &[Header],
    ) -> FsResult<()> {
        self.ensure_key_safe(path)?;
        let (size_bytes, etag) = self.write_payload(path, data, length).await?;
        let manifest = header_value(headers, X_OBJECT_MANIFEST);
        if let Err(err) = self.upsert_object(path, size_bytes, &etag, manifest).await {
            let _ = fs::remove_file(self.payload_path(path.container(), path.key())).await;
            return Err(err);
        }
        debug!(%path, size_bytes, "stored object");
        Ok(())
    }

    async fn put_empty(&self, path: &ObjectPath) -> FsResult<()> {
        self.upload(path, stream::empty().boxed(), 0, &[]).await
    }

    async fn delete(&self, path: &ObjectPath) -> FsResult<bool> {
        self.ensure_key_safe(path)?;
        let result = sqlx::query("DELETE FROM objects WHERE container = ? AND key = ?")
            .bind(path.container())
            .bind(path.key())
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(FsError::not_found(format!("object `{path}` not found")));
        }

        let file_path = self.payload_path(path.container(), path.key());
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed payload {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("payload {} already missing", file_path.display());
            }
            Err(err) => return Err(FsError::Io(err)),
        }
        if let Some(parent) = file_path.parent() {
            let container_root = self.container_root(path.container());
            self.prune_empty_dirs(parent, &container_root).await;
        }
        Ok(true)
    }

    async fn copy(&self, src: &ObjectPath, dst: &ObjectPath) -> FsResult<bool> {
        self.ensure_key_safe(src)?;
        self.ensure_key_safe(dst)?;
        let object = self.fetch_object(src).await?;

        let source_file = self.payload_path(src.container(), src.key());
        let target_file = self.payload_path(dst.container(), dst.key());
        let parent = target_file.parent().map(Path::to_path_buf).ok_or_else(|| {
            FsError::Io(io::Error::new(
                ErrorKind::Other,
                "payload path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        if let Err(err) = fs::copy(&source_file, &tmp_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(if err.kind() == ErrorKind::NotFound {
                FsError::not_found(format!("payload of `{src}` is missing"))
            } else {
                FsError::Io(err)
            });
        }
        self.move_into_place(&tmp_path, &target_file).await?;
        self.upsert_object(dst, object.size_bytes, &object.etag, object.manifest.as_deref())
            .await?;
        debug!(%src, %dst, "copied object");
        Ok(true)
    }

    async fn list(
        &self,
        prefix: &ObjectPath,
        deep: bool,
        add_trailing_slash: bool,
    ) -> FsResult<Bytes> {
        let mut prefix_key = prefix.key().to_string();
        if add_trailing_slash && !prefix_key.is_empty() && !prefix_key.ends_with('/') {
            prefix_key.push('/');
        }
        let objects = self
            .objects_with_prefix(prefix.container(), &prefix_key)
            .await?;
        if objects.is_empty() && prefix_key.is_empty() {
            return Err(FsError::BadResponse {
                operation: format!("list {}", prefix.container()),
                status: NO_CONTENT,
            });
        }

        let mut entries = Vec::new();
        let mut subdirs = BTreeSet::new();
        for object in objects {
            if !deep {
                if let Some(subdir) = compute_common_prefix(&object.key, &prefix_key, "/") {
                    subdirs.insert(subdir);
                    continue;
                }
            }
            entries.push(ListingEntry {
                name: Some(object.key),
                subdir: None,
                bytes: Some(object.size_bytes.max(0) as u64),
                hash: Some(object.etag),
                last_modified: Some(
                    object
                        .last_modified
                        .format("%Y-%m-%dT%H:%M:%S%.6f")
                        .to_string(),
                ),
            });
        }
        entries.extend(subdirs.into_iter().map(ListingEntry::subdir));
        entries.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(Bytes::from(serde_json::to_vec(&entries)?))
    }

    async fn object_location(&self, _path: &ObjectPath) -> FsResult<Bytes> {
        // single node: no replica endpoints to offer
        Ok(Bytes::from_static(b"[]"))
    }
}

/// Smallest string greater than every key starting with `prefix`, or
/// `None` when the range is unbounded (empty prefix). Keys compare as
/// UTF-8 bytes, which follows code point order.
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let next = match last {
            '\u{D7FF}' => Some('\u{E000}'),
            c => char::from_u32(c as u32 + 1),
        };
        if let Some(next) = next {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

/// `Last-Modified` in RFC 1123 form.
fn http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn slice_range(body: &Bytes, range: ByteRange) -> Bytes {
    let len = body.len();
    let start = usize::try_from(range.offset).unwrap_or(usize::MAX).min(len);
    let wanted = usize::try_from(range.length).unwrap_or(usize::MAX);
    let end = start.saturating_add(wanted).min(len);
    body.slice(start..end)
}

/// Roll a key up to the delimiter that follows `prefix`, the way a
/// delimited listing reports it as a `subdir`.
fn compute_common_prefix(key: &str, prefix: &str, delimiter: &str) -> Option<String> {
    let after_prefix = key.strip_prefix(prefix)?;
    let pos = after_prefix.find(delimiter)?;
    let mut combined = String::from(prefix);
    combined.push_str(&after_prefix[..pos + delimiter.len()]);
    Some(combined)
}
