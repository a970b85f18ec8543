//! File-backed implementation of the configuration and status repositories.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::Mutex;

use mcphub_core::{
    ConfigRepository, GlobalConfig, StatusMap, StatusRepository, StorageError, StoreInit,
};

use crate::backup;
use crate::json_file::{read_json, remove_stale_tmp_files, write_json_atomic};
use crate::status_doc::{self, StatusDocument};

pub const CONFIG_FILE: &str = "config.json";
pub const STATUS_FILE: &str = "status.json";
pub const BACKUPS_DIR: &str = "backups";

pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MAX_BACKUPS: usize = 10;

const CONFIG_KIND: &str = "config";
const STATUS_KIND: &str = "status";

/// Where and how a [`FileStore`] keeps its documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub data_dir: PathBuf,
    /// Minimum time between two backups.
    pub backup_interval: Duration,
    /// Backups kept per document kind.
    pub max_backups: usize,
}

impl StoreOptions {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_interval: DEFAULT_BACKUP_INTERVAL,
            max_backups: DEFAULT_MAX_BACKUPS,
        }
    }

    #[must_use]
    pub const fn with_backup_interval(mut self, interval: Duration) -> Self {
        self.backup_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_max_backups(mut self, max: usize) -> Self {
        self.max_backups = max;
        self
    }
}

/// JSON file store for the configuration and running-status documents.
///
/// # Layout
///
/// ```text
/// <data_dir>/config.json
/// <data_dir>/status.json
/// <data_dir>/backups/config-<timestamp>.json
/// <data_dir>/backups/status-<timestamp>.json
/// ```
///
/// Writers of each document are serialized; every write replaces the whole
/// file atomically.
pub struct FileStore {
    options: StoreOptions,
    config_lock: Mutex<()>,
    status_lock: Mutex<()>,
    last_backup: Mutex<Option<Instant>>,
}

impl FileStore {
    pub fn new(options: StoreOptions) -> Self {
        Self {
            options,
            config_lock: Mutex::new(()),
            status_lock: Mutex::new(()),
            last_backup: Mutex::new(None),
        }
    }

    pub const fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn config_path(&self) -> PathBuf {
        self.options.data_dir.join(CONFIG_FILE)
    }

    pub fn status_path(&self) -> PathBuf {
        self.options.data_dir.join(STATUS_FILE)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.options.data_dir.join(BACKUPS_DIR)
    }

    /// Prepare the data directory. Idempotent.
    ///
    /// - creates the data and backup directories and checks they are writable
    /// - removes temp files left by an interrupted write
    /// - seeds absent documents with defaults
    /// - rewrites a legacy status document in the current format
    ///
    /// The returned report lists the ids whose persisted status is running.
    pub async fn initialize(&self) -> Result<StoreInit, StorageError> {
        for dir in [self.options.data_dir.clone(), self.backups_dir()] {
            prepare_dir(&dir).await?;
        }

        remove_stale_tmp_files(&self.options.data_dir).await?;

        let mut report = StoreInit::default();

        {
            let _guard = self.config_lock.lock().await;
            let path = self.config_path();
            if !exists(&path).await? {
                write_json_atomic(&path, &default_config_document()?).await?;
                tracing::info!(path = %path.display(), "Seeded default configuration");
                report.seeded_config = true;
            }
        }

        let servers = {
            let _guard = self.status_lock.lock().await;
            let path = self.status_path();
            match read_json(&path).await? {
                None => {
                    write_status(&path, StatusMap::new()).await?;
                    report.seeded_status = true;
                    StatusMap::new()
                }
                Some(value) => {
                    let decoded =
                        status_doc::decode(value).map_err(|reason| corrupt(&path, reason))?;
                    if decoded.legacy {
                        write_status(&path, decoded.servers.clone()).await?;
                        tracing::info!(
                            path = %path.display(),
                            servers = decoded.servers.len(),
                            "Migrated legacy status document"
                        );
                        report.migrated_status = true;
                    }
                    decoded.servers
                }
            }
        };

        report.auto_start = servers
            .into_iter()
            .filter_map(|(id, running)| running.then_some(id))
            .collect();

        Ok(report)
    }

    /// Back up both documents now and prune old backups.
    ///
    /// Returns the backup files created.
    pub async fn backup_now(&self) -> Result<Vec<PathBuf>, StorageError> {
        let mut last = self.last_backup.lock().await;
        let dir = self.backups_dir();
        let at = Utc::now();

        let mut created = Vec::new();
        for (source, kind) in [
            (self.config_path(), CONFIG_KIND),
            (self.status_path(), STATUS_KIND),
        ] {
            if let Some(path) = backup::snapshot(&source, &dir, kind, at).await? {
                created.push(path);
            }
            backup::prune(&dir, kind, self.options.max_backups).await?;
        }

        *last = Some(Instant::now());
        Ok(created)
    }

    /// Back up if the backup interval elapsed since the last backup.
    ///
    /// Failures are logged; the write that triggered the check has already
    /// been committed.
    async fn backup_if_due(&self) {
        let due = self
            .last_backup
            .lock()
            .await
            .is_none_or(|at| at.elapsed() >= self.options.backup_interval);
        if !due {
            return;
        }

        if let Err(e) = self.backup_now().await {
            tracing::warn!(error = %e, "Backup after write failed");
        }
    }

    async fn read_status(&self) -> Result<StatusMap, StorageError> {
        let path = self.status_path();
        match read_json(&path).await? {
            None => Ok(StatusMap::new()),
            Some(value) => status_doc::decode(value)
                .map(|decoded| decoded.servers)
                .map_err(|reason| corrupt(&path, reason)),
        }
    }
}

#[async_trait]
impl ConfigRepository for FileStore {
    async fn load_config(&self) -> Result<Value, StorageError> {
        match read_json(&self.config_path()).await? {
            Some(doc) => Ok(doc),
            None => default_config_document(),
        }
    }

    async fn save_config(&self, doc: &Value) -> Result<(), StorageError> {
        {
            let _guard = self.config_lock.lock().await;
            write_json_atomic(&self.config_path(), doc).await?;
        }
        tracing::debug!(path = %self.config_path().display(), "Saved configuration");

        self.backup_if_due().await;
        Ok(())
    }
}

#[async_trait]
impl StatusRepository for FileStore {
    async fn load_status(&self) -> Result<StatusMap, StorageError> {
        self.read_status().await
    }

    async fn set_status(&self, id: &str, running: bool) -> Result<(), StorageError> {
        {
            let _guard = self.status_lock.lock().await;
            let mut servers = self.read_status().await?;
            if servers.get(id) == Some(&running) {
                return Ok(());
            }
            servers.insert(id.to_string(), running);
            write_status(&self.status_path(), servers).await?;
        }
        tracing::debug!(server_id = %id, running, "Persisted server status");

        self.backup_if_due().await;
        Ok(())
    }
}

fn default_config_document() -> Result<Value, StorageError> {
    serde_json::to_value(GlobalConfig::default())
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

async fn write_status(path: &Path, servers: StatusMap) -> Result<(), StorageError> {
    let doc = serde_json::to_value(StatusDocument::new(servers))
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    write_json_atomic(path, &doc).await
}

/// Name of the file written to check that a directory accepts writes.
const WRITE_CHECK_FILE: &str = ".write-check";

/// Create `dir` if needed and check that files can be written in it.
async fn prepare_dir(dir: &Path) -> Result<(), StorageError> {
    let unusable = |reason: String| StorageError::Unusable {
        path: dir.to_path_buf(),
        reason,
    };

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        if dir.exists() && !dir.is_dir() {
            unusable("exists but is not a directory".to_string())
        } else {
            unusable(e.to_string())
        }
    })?;

    let check = dir.join(WRITE_CHECK_FILE);
    tokio::fs::write(&check, b"")
        .await
        .map_err(|e| unusable(format!("not writable: {e}")))?;
    let _ = tokio::fs::remove_file(&check).await;
    Ok(())
}

async fn exists(path: &Path) -> Result<bool, StorageError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| StorageError::io("inspect", path, e))
}

fn corrupt(path: &Path, reason: String) -> StorageError {
    StorageError::Corrupt {
        path: path.to_path_buf(),
        reason,
    }
}
