//! Directory listings built from flat, prefix-filtered object listings.

use crate::{
    client::NO_CONTENT,
    errors::{FsError, FsResult},
    models::{FileStatus, ObjectPath, SwiftPath, parse_listing},
    services::fs_store::SwiftFileSystemStore,
};
use tracing::debug;

impl SwiftFileSystemStore {
    /// Children of `path`. `recursive` asks the store for a deep listing
    /// instead of walking subdirectories locally.
    ///
    /// Listing a file returns that file's own status.
    pub async fn list_sub_paths(
        &self,
        path: &SwiftPath,
        recursive: bool,
        newest: bool,
    ) -> FsResult<Vec<FileStatus>> {
        let dir = self.translator.to_dir_path(path);
        self.list_directory(&dir, recursive, newest, true).await
    }

    pub(crate) async fn list_directory(
        &self,
        path: &ObjectPath,
        deep: bool,
        newest: bool,
        add_trailing_slash: bool,
    ) -> FsResult<Vec<FileStatus>> {
        let listed_path = self.translator.qualify_object(path);
        let body = match self.client.list(path, deep, add_trailing_slash).await {
            Ok(body) => body,
            Err(FsError::NotFound(msg)) => {
                debug!(%path, "file/directory not found");
                if path.is_root() {
                    return Ok(Vec::new());
                }
                return Err(FsError::NotFound(msg));
            }
            Err(FsError::BadResponse { status, .. }) if status == NO_CONTENT => {
                // an empty container answers the root listing with no content
                if path.is_root() {
                    return Ok(Vec::new());
                }
                let status = self.stat(&listed_path, newest).await?;
                if status.is_directory() {
                    return Ok(Vec::new());
                }
                return Ok(vec![status]);
            }
            Err(err) => return Err(err),
        };

        let entries = parse_listing(&body)?;

        // listing a plain file's prefix yields nothing
        if entries.is_empty() {
            let status = self.stat(&listed_path, newest).await?;
            if status.is_file() {
                return Ok(vec![status]);
            }
            return Ok(Vec::new());
        }

        let mut self_entry = path.key().to_string();
        if !self_entry.ends_with('/') {
            self_entry.push('/');
        }

        let mut files = Vec::with_capacity(entries.len());
        let mut previous_file = String::new();
        for entry in &entries {
            let Some(name) = entry.key() else {
                continue;
            };
            if name == self_entry {
                continue;
            }
            if !name.ends_with('/') {
                let file_path = self.translator.qualify_key(name);
                files.push(self.stat(&file_path, newest).await?);
                previous_file = name.to_string();
            } else {
                if name.len() == previous_file.len() + 1 && name.starts_with(&previous_file) {
                    // marker left next to a large object's segments
                    continue;
                }
                let dir_path = self.translator.qualify_key(name);
                files.push(self.stat(&dir_path, newest).await?);
            }
        }
        Ok(files)
    }
}
