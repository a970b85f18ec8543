//! Location of the hub's data directory.
//!
//! Only resolves paths; creating and checking the directory is the
//! store's job.

mod error;

use std::path::PathBuf;

pub use error::PathError;

/// Name of the per-user data directory.
pub const DATA_DIR_NAME: &str = "mcphub";

/// Default data directory: `<system data dir>/mcphub`.
pub fn data_root() -> Result<PathBuf, PathError> {
    dirs::data_dir()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .ok_or(PathError::NoDataDir)
}
