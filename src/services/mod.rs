pub mod copy;
pub mod delete;
pub mod fs_store;
pub mod large_object;
pub mod listing;
pub mod local_store;
pub mod locality;
pub mod metadata;
pub mod rename;
pub mod throttle;

pub use fs_store::{DEFAULT_BLOCKSIZE_KB, StoreSettings, SwiftFileSystemStore};
pub use large_object::partition_filename;
pub use local_store::LocalStore;
pub use throttle::Throttle;
