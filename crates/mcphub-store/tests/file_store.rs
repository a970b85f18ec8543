//! Integration tests for `FileStore` against a real temporary directory.
//!
//! # What is tested
//!
//! - First-run seeding and idempotent re-initialization
//! - Configuration save/load round trip
//! - Corrupt documents surface as `StorageError::Corrupt`
//! - Legacy status documents are migrated
//! - Orphaned status records are tolerated
//! - Stale temp files are cleaned up
//! - Backup creation, pruning and the scheduled backup task

use std::sync::Arc;
use std::time::Duration;

use mcphub_core::{
    ConfigRepository, GlobalConfig, ServerConfig, StatusRepository, StorageError,
};
use mcphub_store::backup::list_backups;
use mcphub_store::{FileStore, StatusDocument, StoreOptions, spawn_backup_task};
use serde_json::json;
use tempfile::TempDir;

async fn initialized_store(options: StoreOptions) -> FileStore {
    let store = FileStore::new(options);
    store.initialize().await.unwrap();
    store
}

fn read_file(path: &std::path::Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

// ── Initialization ─────────────────────────────────────────────────

#[tokio::test]
async fn initialize_seeds_documents_once() {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("nested").join("data");
    let store = FileStore::new(StoreOptions::new(&data_dir));

    let first = store.initialize().await.unwrap();
    assert!(first.seeded_config);
    assert!(first.seeded_status);
    assert!(!first.migrated_status);
    assert!(first.auto_start.is_empty());
    assert!(store.backups_dir().is_dir());

    let seeded = read_file(&store.config_path());
    assert_eq!(seeded["serverUrl"], "http://localhost:5000");
    assert_eq!(
        read_file(&store.status_path()),
        json!({ "version": 1, "servers": {} })
    );

    let second = store.initialize().await.unwrap();
    assert!(!second.seeded_config);
    assert!(!second.seeded_status);
}

#[tokio::test]
async fn initialize_reports_running_ids() {
    let dir = TempDir::new().unwrap();
    let store = initialized_store(StoreOptions::new(dir.path())).await;
    store.set_status("svcA", true).await.unwrap();
    store.set_status("svcB", false).await.unwrap();

    let report = store.initialize().await.unwrap();
    assert_eq!(report.auto_start, vec!["svcA".to_string()]);
}

#[tokio::test]
async fn initialize_removes_stale_temp_files() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.json.tmp"), b"{\"serverUrl\":").unwrap();
    std::fs::write(dir.path().join("status.json.tmp"), b"").unwrap();

    initialized_store(StoreOptions::new(dir.path())).await;

    assert!(!dir.path().join("config.json.tmp").exists());
    assert!(!dir.path().join("status.json.tmp").exists());
}

#[tokio::test]
async fn initialize_creates_missing_data_dir() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("a").join("b");

    initialized_store(StoreOptions::new(&nested)).await;

    assert!(nested.join("config.json").is_file());
    assert!(nested.join("backups").is_dir());
    assert!(!nested.join(".write-check").exists());
}

#[tokio::test]
async fn initialize_fails_when_data_dir_is_a_file() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("data");
    std::fs::write(&file, b"").unwrap();

    let err = FileStore::new(StoreOptions::new(&file))
        .initialize()
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Unusable { .. }), "{err:?}");
    assert!(err.to_string().contains("not a directory"), "{err}");
}

// ── Configuration document ─────────────────────────────────────────

#[tokio::test]
async fn config_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = initialized_store(StoreOptions::new(dir.path())).await;

    let mut server = ServerConfig::stdio("npx", vec!["-y".into(), "@mcp/fs".into()]);
    server.env.insert("ROOT".into(), "/tmp".into());
    let config = GlobalConfig::new("http://localhost:8080").with_server("fs", server);
    let doc = serde_json::to_value(&config).unwrap();

    store.save_config(&doc).await.unwrap();

    let loaded = store.load_config().await.unwrap();
    assert_eq!(loaded, doc);
    let typed: GlobalConfig = serde_json::from_value(loaded).unwrap();
    assert_eq!(typed, config);
}

#[tokio::test]
async fn corrupt_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = initialized_store(StoreOptions::new(dir.path())).await;
    std::fs::write(store.config_path(), b"{\"serverUrl\": ").unwrap();

    let err = store.load_config().await.unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }), "{err:?}");
}

// ── Status document ────────────────────────────────────────────────

#[tokio::test]
async fn status_round_trip_keeps_orphans() {
    let dir = TempDir::new().unwrap();
    let store = initialized_store(StoreOptions::new(dir.path())).await;

    store.set_status("configured", true).await.unwrap();
    store.set_status("orphan", true).await.unwrap();
    store.set_status("configured", false).await.unwrap();

    let status = store.load_status().await.unwrap();
    assert_eq!(status.get("configured"), Some(&false));
    assert_eq!(status.get("orphan"), Some(&true));

    let on_disk: StatusDocument = serde_json::from_value(read_file(&store.status_path())).unwrap();
    assert_eq!(on_disk.servers, status);
}

#[tokio::test]
async fn legacy_status_map_is_migrated() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("status.json"), br#"{"a": true, "b": false}"#).unwrap();

    let store = FileStore::new(StoreOptions::new(dir.path()));
    let report = store.initialize().await.unwrap();

    assert!(report.migrated_status);
    assert_eq!(report.auto_start, vec!["a".to_string()]);
    assert_eq!(
        read_file(&store.status_path()),
        json!({ "version": 1, "servers": { "a": true, "b": false } })
    );
}

#[tokio::test]
async fn legacy_running_id_list_is_migrated() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("status.json"), br#"["svcA"]"#).unwrap();

    let store = FileStore::new(StoreOptions::new(dir.path()));
    let report = store.initialize().await.unwrap();

    assert!(report.migrated_status);
    assert_eq!(store.load_status().await.unwrap().get("svcA"), Some(&true));
}

#[tokio::test]
async fn corrupt_status_is_an_error() {
    let dir = TempDir::new().unwrap();
    let store = initialized_store(StoreOptions::new(dir.path())).await;
    std::fs::write(store.status_path(), b"not json").unwrap();

    assert!(matches!(
        store.load_status().await,
        Err(StorageError::Corrupt { .. })
    ));
    assert!(store.set_status("a", true).await.is_err());
}

// ── Backups ────────────────────────────────────────────────────────

#[tokio::test]
async fn first_save_creates_backup_and_interval_suppresses_the_next() {
    let dir = TempDir::new().unwrap();
    let store = initialized_store(StoreOptions::new(dir.path())).await;
    let doc = serde_json::to_value(GlobalConfig::default()).unwrap();

    store.save_config(&doc).await.unwrap();
    store.save_config(&doc).await.unwrap();

    let backups = list_backups(&store.backups_dir(), "config").await.unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(list_backups(&store.backups_dir(), "status").await.unwrap().len(), 1);
}

#[tokio::test]
async fn backups_are_pruned_to_max() {
    let dir = TempDir::new().unwrap();
    let store = initialized_store(StoreOptions::new(dir.path()).with_max_backups(2)).await;

    for _ in 0..4 {
        store.backup_now().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(list_backups(&store.backups_dir(), "config").await.unwrap().len(), 2);
    assert_eq!(list_backups(&store.backups_dir(), "status").await.unwrap().len(), 2);
}

#[tokio::test]
async fn scheduled_backup_task_runs_on_interval() {
    let dir = TempDir::new().unwrap();
    let options = StoreOptions::new(dir.path()).with_backup_interval(Duration::from_millis(50));
    let store = Arc::new(initialized_store(options).await);

    let task = spawn_backup_task(Arc::clone(&store));
    tokio::time::sleep(Duration::from_millis(300)).await;
    task.abort();

    assert!(!list_backups(&store.backups_dir(), "config").await.unwrap().is_empty());
}
