//! SwiftFileSystemStore: hierarchical filesystem semantics over a flat
//! object store.
//!
//! The store keeps no cache. Every stat, listing, rename and delete
//! re-queries the object store through the injected [`StoreClient`], so
//! concurrent callers only share immutable configuration. Operations are
//! split across sibling modules:
//! - `metadata`: path to status resolution, including pseudo-directories
//! - `listing`: flat listings turned into child statuses
//! - `locality`: rack-aware reads
//! - `copy` / `large_object`: copy-then-delete and segmented objects
//! - `rename` / `delete`: the bulk engines

use crate::{
    client::{ByteStream, Header, RackResolver, StoreClient},
    errors::{FsError, FsResult},
    models::{FileStatus, ObjectPath, PathTranslator, SwiftPath},
    services::throttle::Throttle,
};
use std::{fmt, sync::Arc, time::Duration};
use tracing::debug;

/// Default block size reported in every status (32 MiB).
pub const DEFAULT_BLOCKSIZE_KB: u64 = 32 * 1024;

/// Immutable knobs captured at construction.
#[derive(Clone, Debug)]
pub struct StoreSettings {
    pub block_size_kb: u64,
    pub throttle_delay: Duration,
    /// Address of this host, resolved to a rack for locality ranking.
    pub local_host: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            block_size_kb: DEFAULT_BLOCKSIZE_KB,
            throttle_delay: Duration::ZERO,
            local_host: "127.0.0.1".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct SwiftFileSystemStore {
    pub(crate) translator: PathTranslator,
    pub(crate) client: Arc<dyn StoreClient>,
    pub(crate) racks: Arc<dyn RackResolver>,
    pub(crate) throttle: Throttle,
    pub(crate) settings: StoreSettings,
}

impl SwiftFileSystemStore {
    /// Bind a filesystem rooted at `root_uri` to a store client and a
    /// topology resolver.
    pub fn new(
        root_uri: &str,
        client: Arc<dyn StoreClient>,
        racks: Arc<dyn RackResolver>,
        settings: StoreSettings,
    ) -> FsResult<Self> {
        let translator = PathTranslator::new(root_uri)?;
        Ok(Self {
            translator,
            client,
            racks,
            throttle: Throttle::new(settings.throttle_delay),
            settings,
        })
    }

    /// Replace the throttle, e.g. with one tied to a shutdown token.
    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn translator(&self) -> &PathTranslator {
        &self.translator
    }

    /// Block size reported in every status, in bytes.
    pub fn block_size(&self) -> u64 {
        1024 * self.settings.block_size_kb
    }

    pub fn throttle_delay(&self) -> Duration {
        self.throttle.delay()
    }

    /// Insert the configured pause between two mutating requests.
    pub async fn throttle(&self) -> FsResult<()> {
        self.throttle.pause().await
    }

    /// Upload a whole file in one request.
    pub async fn upload_file(&self, path: &SwiftPath, data: ByteStream, length: u64) -> FsResult<()> {
        let object = self.translator.to_object_path(path);
        self.client.upload(&object, data, length, &[]).await
    }

    /// Put a zero-length marker at the directory form of `path`. Parents
    /// are not created.
    pub async fn create_directory(&self, path: &SwiftPath) -> FsResult<()> {
        let marker = self.translator.to_dir_path(path);
        self.client.put_empty(&marker).await
    }

    /// Raw headers of the object at `path`.
    pub async fn object_headers(&self, path: &SwiftPath, newest: bool) -> FsResult<Vec<Header>> {
        let object = self.translator.to_object_path(path);
        self.client.head(&object, newest).await
    }

    /// True when HEAD returns any header. A missing object is `false`, not
    /// an error.
    pub async fn object_exists(&self, path: &SwiftPath) -> FsResult<bool> {
        let object = self.translator.to_object_path(path);
        match self.client.head(&object, true).await {
            Ok(headers) => Ok(!headers.is_empty()),
            Err(FsError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Delete the object behind a status. The container root and
    /// pseudo-directories have nothing to delete and report success.
    pub(crate) async fn delete_object(&self, status: &FileStatus) -> FsResult<bool> {
        let object = self.object_for(status);
        if object.is_root() {
            debug!("not deleting root directory entry");
            return Ok(true);
        }
        if status.is_pseudo_directory() {
            debug!(path = %status.path, "pseudo-directory has no marker to delete");
            return Ok(true);
        }
        self.client.delete(&object).await
    }

    /// Object path of a resolved status: directory form for directories.
    pub(crate) fn object_for(&self, status: &FileStatus) -> ObjectPath {
        if status.is_directory() {
            self.translator.to_dir_path(&status.path)
        } else {
            self.translator.to_object_path(&status.path)
        }
    }
}

impl fmt::Debug for SwiftFileSystemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwiftFileSystemStore")
            .field("root", &self.translator.root().to_string())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
