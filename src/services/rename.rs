//! Rename by copy-then-delete.
//!
//! Not atomic: a directory rename moves children one at a time and a
//! failure part way leaves both trees populated. Completed copies are
//! never rolled back.

use crate::{
    errors::{FsError, FsResult},
    models::{FileStatus, SwiftPath},
    services::fs_store::SwiftFileSystemStore,
};
use tracing::{debug, info, trace, warn};

impl SwiftFileSystemStore {
    /// Move `src` to `dst`.
    ///
    /// - file onto missing path: renamed to `dst`
    /// - file onto directory: moved to `dst/<name>`
    /// - file onto another file: `OperationFailed`, unless both are the
    ///   same path (no-op)
    /// - directory onto missing path: becomes `dst`
    /// - directory onto directory: moved to `dst/<name>`
    /// - directory onto file, or into itself: `OperationFailed`
    ///
    /// A missing source, or a missing destination parent, is `NotFound`.
    pub async fn rename(&self, src: &SwiftPath, dst: &SwiftPath) -> FsResult<()> {
        debug!(%src, %dst, "mv");
        let renaming_onto_self = src.same_location(dst);

        let src_status = self.stat(src, true).await?;
        let src_object = if src_status.is_directory() {
            self.translator.to_dir_path(src)
        } else {
            self.translator.to_object_path(src)
        };
        if src_object.is_root() {
            return Err(FsError::operation_failed("cannot rename root dir"));
        }

        let dst_status = match self.stat(dst, true).await {
            Ok(status) => Some(status),
            Err(FsError::NotFound(_)) => {
                debug!(%dst, "destination does not exist");
                None
            }
            Err(err) => return Err(err),
        };

        // src and dst sharing a parent means the parent is known to exist
        if let Some(dst_parent) = dst.parent() {
            let same_parent = src
                .parent()
                .is_some_and(|src_parent| src_parent.same_location(&dst_parent));
            if !same_parent && !dst_parent.is_root() {
                if let Err(err) = self.stat(&dst_parent, true).await {
                    debug!(parent = %dst_parent, "destination parent directory doesn't exist");
                    return Err(err);
                }
            }
        }

        if src_status.is_file() {
            let target = match &dst_status {
                Some(status) if status.is_directory() => {
                    self.translator.to_object_path(&dst.join(src.name()))
                }
                Some(_) if renaming_onto_self => {
                    debug!(%src, "renaming file onto self: no-op");
                    return Ok(());
                }
                Some(_) => {
                    return Err(FsError::operation_failed(
                        "cannot rename a file over one that already exists",
                    ));
                }
                None => self.translator.to_object_path(dst),
            };
            return self.copy_then_delete(&src_object, &src_status, &target).await;
        }

        self.rename_directory(src, &src_status, dst, dst_status.as_ref())
            .await
    }

    async fn rename_directory(
        &self,
        src: &SwiftPath,
        src_status: &FileStatus,
        dst: &SwiftPath,
        dst_status: Option<&FileStatus>,
    ) -> FsResult<()> {
        if dst_status.is_some_and(|status| !status.is_directory()) {
            return Err(FsError::operation_failed(
                "the source is a directory, but not the destination",
            ));
        }
        let src_object = self.translator.to_dir_path(src);
        let target_path = match dst_status {
            Some(_) => dst.join(src.name()),
            None => dst.clone(),
        };
        let target_object = self.translator.to_dir_path(&target_path);
        if src_object.is_equal_to_or_parent_of(&target_object) {
            return Err(FsError::operation_failed(
                "cannot move a directory under itself",
            ));
        }

        info!(src = %src_object, target = %target_path, "mv directory");
        let children = self.list_directory(&src_object, true, true, true).await?;
        for child in &children {
            debug!(path = %child.path, "directory to copy");
        }

        // every entry is a file or a zero-length directory marker, so the
        // tree moves iteratively in listing order
        let src_prefix = format!("{}/", src.path());
        for child in &children {
            let Some(relative) = child.path.path().strip_prefix(&src_prefix) else {
                warn!(path = %child.path, "listed entry is outside the source directory");
                continue;
            };
            let dest_path = target_path.join(relative);
            trace!(source = %child.path, %relative, dest = %dest_path, "rename entry");

            if child.is_pseudo_directory() {
                debug!(path = %child.path, "pseudo-directory has no marker to move");
            } else {
                let (copy_source, copy_dest) = if child.is_directory() {
                    (
                        self.translator.to_dir_path(&child.path),
                        self.translator.to_dir_path(&dest_path),
                    )
                } else {
                    (
                        self.translator.to_object_path(&child.path),
                        self.translator.to_object_path(&dest_path),
                    )
                };
                match self.copy_then_delete(&copy_source, child, &copy_dest).await {
                    Ok(()) => {}
                    Err(FsError::NotFound(_)) => info!(path = %child.path, "skipping rename"),
                    Err(err) => return Err(err),
                }
            }
            self.throttle().await?;
        }

        // finally the directory marker itself
        if !src_object.is_root() && !src_status.is_pseudo_directory() {
            match self
                .copy_then_delete(&src_object, src_status, &target_object)
                .await
            {
                Ok(()) => {}
                Err(FsError::NotFound(_)) => {
                    warn!(src = %src_object, "source directory deleted during rename");
                    self.client.put_empty(&target_object).await?;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
