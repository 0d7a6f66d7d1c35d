//! Dynamic large objects: a zero-length manifest whose
//! `X-Object-Manifest` header names a key prefix, plus the segments
//! stored under that prefix. Segment order is key order, so part numbers
//! are zero-padded.

use crate::{
    client::{ByteStream, Header, X_OBJECT_MANIFEST},
    errors::{FsError, FsResult},
    models::{FileStatus, ObjectPath, SwiftPath},
    services::fs_store::SwiftFileSystemStore,
};
use futures::stream;
use tracing::debug;

/// Segment name for a part number: six digits, zero padded.
pub fn partition_filename(part_number: u32) -> String {
    format!("{part_number:06}")
}

impl SwiftFileSystemStore {
    /// Upload one segment of a large object to `<path>/<part>`.
    pub async fn upload_file_part(
        &self,
        path: &SwiftPath,
        part_number: u32,
        data: ByteStream,
        length: u64,
    ) -> FsResult<()> {
        let dir = self.translator.to_dir_path(path);
        let segment = ObjectPath::new(
            dir.container(),
            &format!("{}{}", dir.key(), partition_filename(part_number)),
        );
        self.client.upload(&segment, data, length, &[]).await
    }

    /// Write the zero-length manifest at `path` pointing at `path/`.
    pub async fn create_manifest_for_part_upload(&self, path: &SwiftPath) -> FsResult<()> {
        let object = self.translator.to_object_path(path);
        let manifest = format!(
            "{}/{}/",
            object.container(),
            object.key().trim_end_matches('/')
        );
        self.client
            .upload(
                &object,
                Box::pin(stream::empty()),
                0,
                &[Header::new(X_OBJECT_MANIFEST, manifest)],
            )
            .await
    }

    /// Segments of a large object in upload order; empty for plain files.
    pub async fn list_segments(&self, status: &FileStatus, newest: bool) -> FsResult<Vec<FileStatus>> {
        match &status.dlo_prefix {
            Some(prefix) => {
                let manifest = self.translator.to_object_path(&status.path);
                self.segments_under(prefix, &manifest, newest).await
            }
            None => Ok(Vec::new()),
        }
    }

    /// Files under `prefix/`, never the manifest itself.
    async fn segments_under(
        &self,
        prefix: &ObjectPath,
        manifest: &ObjectPath,
        newest: bool,
    ) -> FsResult<Vec<FileStatus>> {
        let entries = match self.list_directory(prefix, true, newest, true).await {
            Ok(entries) => entries,
            Err(FsError::NotFound(_)) => {
                debug!(%prefix, "large object has no segments");
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        // an empty prefix listing falls back to the manifest's own status
        Ok(entries
            .into_iter()
            .filter(|entry| {
                let key = self.translator.to_object_path(&entry.path);
                entry.is_file()
                    && key.key() != manifest.key()
                    && key.key().starts_with(prefix.key())
            })
            .collect())
    }

    /// Re-create a large object at `dst`: new manifest, every non-empty
    /// segment copied under the new prefix. Source segments are deleted
    /// only after all copies succeeded.
    pub(crate) async fn copy_large_object(
        &self,
        manifest: &ObjectPath,
        prefix: &ObjectPath,
        dst: &ObjectPath,
        delete_source: bool,
    ) -> FsResult<()> {
        let new_prefix = format!("{}/", dst.key().trim_end_matches('/'));
        let segments = self.segments_under(prefix, manifest, true).await?;
        self.create_manifest_for_part_upload(&self.translator.qualify_object(dst))
            .await?;

        let mut sources = Vec::with_capacity(segments.len());
        for segment in &segments {
            let old_key = self.translator.to_object_path(&segment.path).key().to_string();
            let source = ObjectPath::new(prefix.container(), &old_key);
            if segment.length > 0 {
                let suffix = old_key.strip_prefix(prefix.key()).ok_or_else(|| {
                    FsError::Protocol(format!("segment {old_key} is not under {prefix}"))
                })?;
                let target = ObjectPath::new(
                    dst.container(),
                    &format!("{}{}", new_prefix, suffix.trim_start_matches('/')),
                );
                if !self.client.copy(&source, &target).await? {
                    return Err(FsError::operation_failed(format!(
                        "copy of segment {source} to {target} failed"
                    )));
                }
            }
            sources.push(source);
        }

        if delete_source {
            for source in &sources {
                self.client.delete(source).await?;
            }
        }
        Ok(())
    }
}
