//! Hierarchical filesystem semantics (files, directories, rename, delete)
//! over a flat Swift-style object store.

pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

pub use errors::{FsError, FsResult};
pub use models::{FileKind, FileStatus, ObjectPath, SwiftPath};
pub use services::{LocalStore, StoreSettings, SwiftFileSystemStore};
