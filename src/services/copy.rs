//! Copy and copy-then-delete of single objects.

use crate::{
    errors::{FsError, FsResult},
    models::{FileStatus, ObjectPath},
    services::fs_store::SwiftFileSystemStore,
};

impl SwiftFileSystemStore {
    /// Move one object: copy it, then delete the source once the copy has
    /// succeeded.
    pub(crate) async fn copy_then_delete(
        &self,
        src: &ObjectPath,
        src_status: &FileStatus,
        dst: &ObjectPath,
    ) -> FsResult<()> {
        self.copy_object(src, src_status, dst, true).await
    }

    /// Copy `src` to `dst`, rebuilding segmented objects under the new
    /// prefix. A failed copy never deletes the source.
    pub(crate) async fn copy_object(
        &self,
        src: &ObjectPath,
        src_status: &FileStatus,
        dst: &ObjectPath,
        delete_source: bool,
    ) -> FsResult<()> {
        if src.is_equal_to_or_parent_of(dst) {
            return Err(FsError::operation_failed(format!(
                "can't copy {src} onto {dst}"
            )));
        }
        match &src_status.dlo_prefix {
            Some(prefix) => {
                self.copy_large_object(src, prefix, dst, delete_source).await?;
            }
            None => {
                if !self.client.copy(src, dst).await? {
                    return Err(FsError::operation_failed(format!(
                        "copy of {src} to {dst} failed"
                    )));
                }
            }
        }
        if delete_source {
            self.client.delete(src).await?;
        }
        Ok(())
    }
}
