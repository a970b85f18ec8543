//! Timestamped backup copies of the stored documents.
//!
//! Backups live in `<data_dir>/backups/` as `<kind>-<timestamp>.json`.
//! Timestamps sort lexically in chronological order, so pruning keeps the
//! last `max_backups` names per kind.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::task::JoinHandle;

use mcphub_core::StorageError;

use crate::FileStore;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.3fZ";

/// File name of a backup of `kind` taken at `at`.
pub fn backup_file_name(kind: &str, at: DateTime<Utc>) -> String {
    format!("{kind}-{}.json", at.format(TIMESTAMP_FORMAT))
}

/// Copy `source` into `backups_dir`. Returns `None` if `source` does not exist.
pub async fn snapshot(
    source: &Path,
    backups_dir: &Path,
    kind: &str,
    at: DateTime<Utc>,
) -> Result<Option<PathBuf>, StorageError> {
    let target = backups_dir.join(backup_file_name(kind, at));
    match fs::copy(source, &target).await {
        Ok(_) => Ok(Some(target)),
        Err(e) if e.kind() == io::ErrorKind::NotFound && !source.exists() => Ok(None),
        Err(e) => Err(StorageError::io("back up", source, e)),
    }
}

/// Backups of `kind`, oldest first.
pub async fn list_backups(backups_dir: &Path, kind: &str) -> Result<Vec<PathBuf>, StorageError> {
    let mut entries = match fs::read_dir(backups_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io("list", backups_dir, e)),
    };

    let prefix = format!("{kind}-");
    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io("list", backups_dir, e))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(&prefix) && name.ends_with(".json") {
            found.push(entry.path());
        }
    }

    found.sort();
    Ok(found)
}

/// Delete the oldest backups of `kind` so that at most `keep` remain.
///
/// Returns the number of files deleted.
pub async fn prune(backups_dir: &Path, kind: &str, keep: usize) -> Result<usize, StorageError> {
    let backups = list_backups(backups_dir, kind).await?;
    let excess = backups.len().saturating_sub(keep);

    for path in &backups[..excess] {
        match fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Pruned backup"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io("prune", path, e)),
        }
    }

    Ok(excess)
}

/// Spawn a task that backs up both documents every `backup_interval`.
///
/// The first backup happens one interval after the call. Abort the
/// returned handle to stop the task.
pub fn spawn_backup_task(store: Arc<FileStore>) -> JoinHandle<()> {
    let period = store.options().backup_interval;

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.backup_now().await {
                Ok(created) => tracing::debug!(count = created.len(), "Scheduled backup complete"),
                Err(e) => tracing::warn!(error = %e, "Scheduled backup failed"),
            }
        }
    })
}
