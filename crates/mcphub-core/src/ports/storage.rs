//! Persistence ports for the configuration and status documents.
//!
//! The two documents are stored independently so that running status
//! survives configuration rewrites and vice versa.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Persisted running status keyed by server id.
pub type StatusMap = BTreeMap<String, bool>;

/// Storage failures.
///
/// A missing document is not an error (callers get the seeded default);
/// a corrupt one always is.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing files failed.
    #[error("Failed to {op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored bytes could not be parsed.
    #[error("Stored document {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The document could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The storage location cannot be created or written.
    #[error("Storage location {} is not usable: {reason}", .path.display())]
    Unusable { path: PathBuf, reason: String },
}

impl StorageError {
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Report produced when a store is initialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreInit {
    /// The configuration document was absent and has been seeded.
    pub seeded_config: bool,
    /// The status document was absent and has been seeded.
    pub seeded_status: bool,
    /// The status document was in a legacy shape and has been rewritten.
    pub migrated_status: bool,
    /// Ids whose persisted status is running (auto-start candidates).
    pub auto_start: Vec<String>,
}

/// Repository for the configuration document.
///
/// Documents cross this boundary as raw JSON so that callers can tell a
/// storage failure apart from a document that no longer validates.
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Load the last saved document, or the seeded default if none exists.
    ///
    /// # Errors
    ///
    /// - `Corrupt` if the stored bytes are not valid JSON
    /// - `Io` for read failures
    async fn load_config(&self) -> Result<Value, StorageError>;

    /// Atomically replace the stored document.
    ///
    /// On failure the previously stored document is left intact.
    async fn save_config(&self, doc: &Value) -> Result<(), StorageError>;
}

/// Repository for the running-status document.
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Load every status record, including orphans whose id is no longer
    /// configured.
    async fn load_status(&self) -> Result<StatusMap, StorageError>;

    /// Durably record the status of one server. Returns once committed.
    async fn set_status(&self, id: &str, running: bool) -> Result<(), StorageError>;
}
