//! Value types of the filesystem layer.
//!
//! Everything here is recomputed per call from store responses; nothing is
//! cached between operations.

pub mod file_status;
pub mod listing;
pub mod object_path;

pub use file_status::{FileKind, FileStatus};
pub use listing::{ListingEntry, parse_listing};
pub use object_path::{ObjectPath, PathTranslator, SwiftPath};
