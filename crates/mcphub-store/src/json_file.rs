//! Atomic JSON file I/O.
//!
//! # Atomicity
//! 1. Write to `<file>.tmp` and fsync it
//! 2. Rename over `<file>` (atomic on Unix/macOS)
//!
//! Readers therefore see either the old or the new document, never a mix.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use mcphub_core::StorageError;

/// Extension used for in-flight writes.
pub const TMP_EXTENSION: &str = "tmp";

/// Path of the temporary file used while replacing `path`.
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(TMP_EXTENSION);
    path.with_file_name(name)
}

/// Read and parse a JSON document.
///
/// Returns `Ok(None)` if the file does not exist. Unparseable content is
/// reported as [`StorageError::Corrupt`].
pub async fn read_json(path: &Path) -> Result<Option<Value>, StorageError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io("read", path, e)),
    };

    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StorageError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Write a JSON document atomically using temp file + fsync + rename.
///
/// On failure the previous content of `path` is untouched and the temp
/// file is removed (best effort).
pub async fn write_json_atomic(path: &Path, value: &Value) -> Result<(), StorageError> {
    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
    bytes.push(b'\n');

    let temp = tmp_path(path);
    if let Err(e) = write_and_sync(&temp, &bytes).await {
        let _ = fs::remove_file(&temp).await;
        return Err(StorageError::io("write", temp, e));
    }

    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(StorageError::io("replace", path, e));
    }

    Ok(())
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

/// Remove `*.tmp` files left behind by an interrupted write.
///
/// Returns the number of files removed.
pub async fn remove_stale_tmp_files(dir: &Path) -> Result<usize, StorageError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(StorageError::io("list", dir, e)),
    };

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StorageError::io("list", dir, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(TMP_EXTENSION) {
            continue;
        }
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Removed stale temporary file");
                removed += 1;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::io("remove", path, e)),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_tmp_path() {
        assert_eq!(
            tmp_path(Path::new("/data/config.json")),
            PathBuf::from("/data/config.json.tmp")
        );
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        assert!(read_json(&dir.path().join("absent.json")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let doc = json!({ "serverUrl": "http://localhost:5000" });

        write_json_atomic(&path, &doc).await.unwrap();

        assert_eq!(read_json(&path).await.unwrap(), Some(doc));
        assert!(!tmp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = read_json(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let original = json!({ "v": 1 });
        write_json_atomic(&path, &original).await.unwrap();

        // A directory in the temp file's place makes the write fail.
        std::fs::create_dir(tmp_path(&path)).unwrap();
        let result = write_json_atomic(&path, &json!({ "v": 2 })).await;

        assert!(result.is_err());
        assert_eq!(read_json(&path).await.unwrap(), Some(original));
    }

    #[tokio::test]
    async fn test_remove_stale_tmp_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("config.json.tmp"), b"partial").unwrap();
        std::fs::write(dir.path().join("config.json"), b"{}").unwrap();

        let removed = remove_stale_tmp_files(dir.path()).await.unwrap();

        assert_eq!(removed, 1);
        assert!(dir.path().join("config.json").exists());
        assert!(!dir.path().join("config.json.tmp").exists());
    }
}
