//! Race-tolerant delete of a path and everything beneath it.

use crate::{
    errors::{FsError, FsResult},
    models::{FileStatus, SwiftPath},
    services::fs_store::SwiftFileSystemStore,
};
use tracing::debug;

impl SwiftFileSystemStore {
    /// Delete `path`. A directory with children needs `recursive`.
    ///
    /// The target itself must exist (`NotFound` otherwise). Entries under
    /// it that vanish while the delete runs are treated as already
    /// deleted: another client removing `/dir/file` between our listing
    /// and our delete request does not fail the operation.
    pub async fn delete(&self, path: &SwiftPath, recursive: bool) -> FsResult<bool> {
        debug!(%path, recursive, "deleting path");
        let status = self.stat(path, true).await?;

        let entries = match self.list_sub_paths(path, true, true).await {
            Ok(entries) => entries,
            Err(err) => {
                debug!(%path, error = %err, "listing failed; treating as no entries");
                Vec::new()
            }
        };
        debug!(%path, count = entries.len(), "status entries");

        if entries.is_empty() {
            // empty directory or a plain object
            self.delete_target(&status).await?;
            return Ok(true);
        }

        if entries.len() == 1 && entries[0].path == status.path {
            debug!(%path, "deleting simple file");
            self.delete_target(&status).await?;
            return Ok(true);
        }

        if !status.is_directory() {
            debug!(%path, "multiple child entries but entry has data: assume partitioned");
        } else if !recursive {
            return Err(FsError::operation_failed(format!(
                "directory {} is not empty: {}",
                status.path,
                entries
                    .iter()
                    .map(|entry| entry.path.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            )));
        }

        for entry in &entries {
            match self.delete_object(entry).await {
                Ok(true) => {}
                Ok(false) => debug!(path = %entry.path, "failed to delete entry; continuing"),
                Err(FsError::NotFound(_)) => {
                    debug!(path = %entry.path, "path is no longer present; continuing")
                }
                Err(err) => return Err(err),
            }
            self.throttle().await?;
        }

        debug!(%path, "deleting base entry");
        self.delete_target(&status).await?;
        Ok(true)
    }

    /// Delete the resolved target; it disappearing concurrently is the
    /// outcome we wanted anyway.
    async fn delete_target(&self, status: &FileStatus) -> FsResult<()> {
        match self.delete_object(status).await {
            Ok(_) => Ok(()),
            Err(FsError::NotFound(_)) => {
                debug!(path = %status.path, "target already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}
