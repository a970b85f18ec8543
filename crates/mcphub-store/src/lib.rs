//! JSON file persistence for mcphub.
//!
//! [`FileStore`] implements both `ConfigRepository` and `StatusRepository`
//! from `mcphub-core`, keeping each document in its own file with atomic
//! replacement and timestamped backups.
#![deny(unsafe_code)]

pub mod backup;
pub mod file_store;
pub mod json_file;
pub mod status_doc;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

pub use backup::spawn_backup_task;
pub use file_store::{
    BACKUPS_DIR, CONFIG_FILE, DEFAULT_BACKUP_INTERVAL, DEFAULT_MAX_BACKUPS, FileStore,
    STATUS_FILE, StoreOptions,
};
pub use status_doc::{STATUS_VERSION, StatusDocument};

#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryStore;
