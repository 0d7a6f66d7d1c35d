//! Resolved status of a path: file, directory, or pseudo-directory.

use crate::models::object_path::{ObjectPath, SwiftPath};
use chrono::{DateTime, Utc};
use std::fmt;

/// What a path resolved to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    File,
    /// Backed by a zero-byte marker object or the container itself.
    Directory,
    /// Implied by a listing `subdir` entry, with no backing object.
    PseudoDirectory,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileKind::File => "file",
            FileKind::Directory => "dir",
            FileKind::PseudoDirectory => "pseudo",
        };
        f.write_str(label)
    }
}

/// Status returned to filesystem callers.
///
/// Built through [`FileStatus::file`], [`FileStatus::directory`] or
/// [`FileStatus::pseudo_directory`] so that directories never carry a
/// length or a large-object prefix.
#[derive(Clone, Debug, PartialEq)]
pub struct FileStatus {
    /// Qualified path, never with a trailing separator.
    pub path: SwiftPath,
    pub length: u64,
    pub kind: FileKind,
    pub block_replication: u16,
    pub block_size: u64,
    pub modification_time: DateTime<Utc>,
    /// Segment prefix when the file is a dynamic large object.
    pub dlo_prefix: Option<ObjectPath>,
}

impl FileStatus {
    pub fn file(
        path: SwiftPath,
        length: u64,
        block_size: u64,
        modification_time: DateTime<Utc>,
        dlo_prefix: Option<ObjectPath>,
    ) -> Self {
        Self {
            path,
            length,
            kind: FileKind::File,
            block_replication: 1,
            block_size,
            modification_time,
            dlo_prefix,
        }
    }

    pub fn directory(path: SwiftPath, block_size: u64, modification_time: DateTime<Utc>) -> Self {
        Self {
            path,
            length: 0,
            kind: FileKind::Directory,
            block_replication: 1,
            block_size,
            modification_time,
            dlo_prefix: None,
        }
    }

    pub fn pseudo_directory(path: SwiftPath) -> Self {
        Self {
            path,
            length: 0,
            kind: FileKind::PseudoDirectory,
            block_replication: 1,
            block_size: 0,
            modification_time: Utc::now(),
            dlo_prefix: None,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, FileKind::Directory | FileKind::PseudoDirectory)
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_pseudo_directory(&self) -> bool {
        self.kind == FileKind::PseudoDirectory
    }

    pub fn is_dlo(&self) -> bool {
        self.dlo_prefix.is_some()
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<6} {:>12} {} {}",
            self.kind,
            self.length,
            self.modification_time.format("%Y-%m-%d %H:%M:%S"),
            self.path
        )
    }
}
