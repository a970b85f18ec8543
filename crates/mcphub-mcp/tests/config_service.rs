//! Integration tests for `McpConfigService`.
//!
//! The service runs against `MemoryStore` and `FakeConnector`, so no real
//! processes or files are involved.
//!
//! # What is tested
//!
//! - Validation and save/load round trip
//! - Toggle semantics, including unknown ids and missing commands
//! - Config list view and display-name fallback
//! - Recovery sweep after a restart
//! - Crash reconciliation through the exit watcher
//! - Concurrent toggles of the same id

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mcphub_core::{
    AppEvent, AppEventEmitter, GlobalConfig, McpConfigListItem, McpServiceError, McpTool,
    ServerConfig,
};
use mcphub_mcp::{FakeConnector, McpConfigService, ProcessManager};
use mcphub_store::MemoryStore;
use serde_json::json;

// ── Test harness ───────────────────────────────────────────────────

/// Emitter that records every event.
#[derive(Default)]
struct RecordingEmitter {
    events: Mutex<Vec<AppEvent>>,
}

impl RecordingEmitter {
    fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AppEventEmitter for RecordingEmitter {
    fn emit(&self, event: AppEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    connector: Arc<FakeConnector>,
    emitter: Arc<RecordingEmitter>,
    service: Arc<McpConfigService>,
}

impl Harness {
    fn new(store: MemoryStore) -> Self {
        let store = Arc::new(store);
        let connector = Arc::new(FakeConnector::new());
        let emitter = Arc::new(RecordingEmitter::default());
        let processes = Arc::new(ProcessManager::new(connector.clone()));
        let service = Arc::new(McpConfigService::new(
            store.clone(),
            store.clone(),
            processes,
            emitter.clone(),
        ));
        Self {
            store,
            connector,
            emitter,
            service,
        }
    }

    fn with_config(config: &GlobalConfig) -> Self {
        Self::new(MemoryStore::with_config(config))
    }
}

fn echo_config() -> GlobalConfig {
    GlobalConfig::default().with_server("a", ServerConfig::stdio("echo", vec!["hi".to_string()]))
}

// ── Configuration ──────────────────────────────────────────────────

#[tokio::test]
async fn valid_document_has_no_errors() {
    let h = Harness::new(MemoryStore::new());
    let report = h.service.validate_config(&json!({
        "serverUrl": "http://localhost:5000",
        "transport": "stdio",
        "debug": true,
        "mcpServers": { "fs": { "command": "npx", "args": ["-y", "@mcp/fs"] } }
    }));
    assert!(report.is_valid);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn missing_server_url_is_rejected_without_write() {
    let h = Harness::new(MemoryStore::new());

    let err = h
        .service
        .save_config_document(&json!({ "mcpServers": {} }))
        .await
        .unwrap_err();

    let McpServiceError::Validation(validation) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(validation.errors.iter().any(|e| e.contains("Server URL")));
    assert_eq!(h.store.config_saves(), 0);
}

#[tokio::test]
async fn save_then_load_round_trips() {
    let h = Harness::new(MemoryStore::new());
    let mut server = ServerConfig::stdio("npx", vec!["-y".into(), "@mcp/git".into()]).with_name("Git");
    server.env.insert("GIT_DIR".into(), "/repo/.git".into());
    let config = GlobalConfig::new("https://chat.example.com").with_server("git", server);

    h.service.save_config(&config).await.unwrap();

    assert_eq!(h.service.load_config().await.unwrap(), config);
    assert!(
        h.emitter
            .events()
            .iter()
            .any(|e| matches!(e, AppEvent::ConfigSaved { server_count: 1 }))
    );
}

#[tokio::test]
async fn stored_document_that_no_longer_validates_is_a_validation_error() {
    let h = Harness::new(MemoryStore::with_document(json!({ "serverUrl": "not a url" })));

    let err = h.service.load_config().await.unwrap_err();
    assert!(matches!(err, McpServiceError::Validation(_)), "{err:?}");
}

#[tokio::test]
async fn failed_save_is_a_storage_error() {
    let h = Harness::new(MemoryStore::new());
    h.store.fail_config_saves(true);

    let err = h.service.save_config(&GlobalConfig::default()).await.unwrap_err();
    assert!(matches!(err, McpServiceError::Storage(_)), "{err:?}");
}

// ── Toggle ─────────────────────────────────────────────────────────

#[tokio::test]
async fn end_to_end_toggle_and_list() {
    let h = Harness::new(MemoryStore::new());
    h.service.save_config(&echo_config()).await.unwrap();

    assert!(h.service.toggle_status("a", true).await.unwrap());

    assert_eq!(
        h.service.get_config_list().await.unwrap(),
        vec![McpConfigListItem {
            id: "a".to_string(),
            name: "MCP配置a".to_string(),
            is_running: true,
        }]
    );
    let spec = &h.connector.specs()[0];
    assert_eq!(spec.command, "echo");
    assert_eq!(spec.args, vec!["hi"]);
}

#[tokio::test]
async fn toggle_twice_returns_to_stopped() {
    let h = Harness::with_config(&echo_config());

    assert!(h.service.toggle_status("a", true).await.unwrap());
    assert!(h.service.is_mcp_running("a").await.unwrap());

    assert!(!h.service.toggle_status("a", true).await.unwrap());
    assert!(!h.service.is_mcp_running("a").await.unwrap());
    assert!(!h.service.processes().is_alive("a").await);
}

#[tokio::test]
async fn toggle_writes_auto_start_when_requested() {
    let h = Harness::with_config(&echo_config());

    h.service.toggle_status("a", true).await.unwrap();
    assert_eq!(h.store.config_document()["mcpServers"]["a"]["autoStart"], true);

    h.service.toggle_status("a", true).await.unwrap();
    assert_eq!(h.store.config_document()["mcpServers"]["a"]["autoStart"], false);
}

#[tokio::test]
async fn toggle_without_config_update_leaves_document_alone() {
    let h = Harness::with_config(&echo_config());
    let before = h.store.config_document();

    h.service.toggle_status("a", false).await.unwrap();

    assert_eq!(h.store.config_document(), before);
    assert_eq!(h.store.config_saves(), 0);
}

#[tokio::test]
async fn toggle_unknown_id_is_not_found() {
    let h = Harness::with_config(&echo_config());

    let err = h.service.toggle_status("nope", true).await.unwrap_err();

    assert!(matches!(err, McpServiceError::NotFound(ref id) if id == "nope"));
    assert_eq!(err.to_string(), "MCP configuration with ID nope not found");
    assert!(h.store.status_snapshot().is_empty());
}

#[tokio::test]
async fn toggle_without_command_is_a_validation_error() {
    let config = GlobalConfig::default().with_server("b", ServerConfig::default());
    let h = Harness::with_config(&config);

    let err = h.service.toggle_status("b", true).await.unwrap_err();

    let McpServiceError::Validation(validation) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert_eq!(
        validation.errors,
        vec!["MCP server configuration is missing command: b".to_string()]
    );
    assert!(!h.service.is_mcp_running("b").await.unwrap());
    assert_eq!(h.connector.connect_count(), 0);
}

#[tokio::test]
async fn failed_start_leaves_status_unchanged() {
    let config =
        GlobalConfig::default().with_server("x", ServerConfig::stdio("missing-binary", vec![]));
    let h = Harness::with_config(&config);
    h.connector.fail_command("missing-binary");

    let err = h.service.toggle_status("x", true).await.unwrap_err();

    assert!(matches!(err, McpServiceError::StartFailed { .. }), "{err:?}");
    assert!(!h.service.is_mcp_running("x").await.unwrap());
    assert_eq!(h.store.status_writes(), 0);
    assert!(
        h.emitter
            .events()
            .iter()
            .any(|e| matches!(e, AppEvent::McpServerError { .. }))
    );
}

#[tokio::test]
async fn concurrent_toggles_of_one_id_serialize() {
    let h = Harness::with_config(&echo_config());

    let (first, second) = tokio::join!(
        h.service.toggle_status("a", false),
        h.service.toggle_status("a", false)
    );

    let mut results = vec![first.unwrap(), second.unwrap()];
    results.sort_unstable();
    assert_eq!(results, vec![false, true]);
    assert!(!h.service.is_mcp_running("a").await.unwrap());
    assert!(!h.service.processes().is_alive("a").await);
}

/// Wait until `count` connects have reached the connector.
async fn wait_for_connects(connector: &FakeConnector, count: usize) {
    for _ in 0..100 {
        if connector.connect_count() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("connector saw {} connects, wanted {count}", connector.connect_count());
}

fn slow_and_fast_config() -> GlobalConfig {
    GlobalConfig::default()
        .with_server("a", ServerConfig::stdio("slow", Vec::new()))
        .with_server("b", ServerConfig::stdio("fast", Vec::new()))
}

#[tokio::test]
async fn auto_start_write_keeps_changes_made_during_start() {
    let h = Harness::with_config(&slow_and_fast_config());
    let gate = h.connector.gate_command("slow");

    let toggle_a = {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move { service.toggle_status("a", true).await })
    };
    wait_for_connects(&h.connector, 1).await;

    // A sibling toggle and a full save land while "a" is still starting
    assert!(h.service.toggle_status("b", true).await.unwrap());
    let mut edited = h.service.load_config().await.unwrap();
    edited.server_url = "http://example.com:9000".to_string();
    edited
        .mcp_servers
        .insert("c".to_string(), ServerConfig::stdio("new", Vec::new()));
    h.service.save_config(&edited).await.unwrap();

    gate.notify_one();
    assert!(toggle_a.await.unwrap().unwrap());

    let stored = h.service.load_config().await.unwrap();
    assert_eq!(stored.server_url, "http://example.com:9000");
    assert!(stored.server("c").is_some());
    assert_eq!(stored.server("a").unwrap().auto_start, Some(true));
    assert_eq!(stored.server("b").unwrap().auto_start, Some(true));
}

#[tokio::test]
async fn auto_start_write_skips_server_removed_during_start() {
    let h = Harness::with_config(&slow_and_fast_config());
    let gate = h.connector.gate_command("slow");

    let toggle_a = {
        let service = Arc::clone(&h.service);
        tokio::spawn(async move { service.toggle_status("a", true).await })
    };
    wait_for_connects(&h.connector, 1).await;

    let mut edited = h.service.load_config().await.unwrap();
    edited.mcp_servers.remove("a");
    h.service.save_config(&edited).await.unwrap();

    gate.notify_one();
    assert!(toggle_a.await.unwrap().unwrap());

    let stored = h.service.load_config().await.unwrap();
    assert!(stored.server("a").is_none());
    assert_eq!(stored.mcp_servers.len(), 1);
}

// ── Capabilities ───────────────────────────────────────────────────

#[tokio::test]
async fn capabilities_of_running_and_stopped_servers() {
    let h = Harness::with_config(&echo_config());
    h.connector
        .set_tools("echo", vec![McpTool::new("echo", Some("Echo input".to_string()))]);

    let err = h.service.capabilities("a").await.unwrap_err();
    assert_eq!(err.to_string(), "MCP server not running: a");

    h.service.toggle_status("a", false).await.unwrap();
    let tools = h.service.capabilities("a").await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].description.as_deref(), Some("Echo input"));
}

// ── Recovery sweep ─────────────────────────────────────────────────

#[tokio::test]
async fn sweep_starts_recorded_servers_without_touching_config() {
    let config = GlobalConfig::default()
        .with_server("svcA", ServerConfig::stdio("svc-a", vec![]))
        .with_server("svcB", ServerConfig::stdio("svc-b", vec![]));
    let store = MemoryStore::with_config(&config).with_status([("svcA", true), ("svcB", false)]);
    let h = Harness::new(store);
    let before = h.store.config_document();

    let report = h.service.auto_start_recovery_sweep().await.unwrap();

    assert_eq!(report.started, vec!["svcA".to_string()]);
    assert!(h.service.processes().is_alive("svcA").await);
    assert!(!h.service.processes().is_alive("svcB").await);
    assert_eq!(h.store.config_document(), before);
    assert_eq!(h.store.config_saves(), 0);
    assert_eq!(h.store.status_writes(), 0);
}

#[tokio::test]
async fn sweep_skips_orphans_and_survives_failures() {
    let config = GlobalConfig::default()
        .with_server("bad", ServerConfig::stdio("missing-binary", vec![]))
        .with_server("good", ServerConfig::stdio("good", vec![]));
    let store = MemoryStore::with_config(&config).with_status([
        ("bad", true),
        ("good", true),
        ("gone", true),
    ]);
    let h = Harness::new(store);
    h.connector.fail_command("missing-binary");

    let report = h.service.auto_start_recovery_sweep().await.unwrap();

    assert_eq!(report.started, vec!["good".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, "bad");
    assert_eq!(report.orphaned, vec!["gone".to_string()]);
    // Failures leave the recorded status alone
    assert!(h.service.is_mcp_running("bad").await.unwrap());
}

// ── Crash reconciliation ───────────────────────────────────────────

#[tokio::test]
async fn crash_is_reflected_in_status() {
    let h = Harness::with_config(&echo_config());
    let watcher = h.service.spawn_exit_watcher();

    h.service.toggle_status("a", true).await.unwrap();
    assert!(h.connector.crash("echo", Some(1)));

    let mut stopped = false;
    for _ in 0..50 {
        if !h.service.is_mcp_running("a").await.unwrap() {
            stopped = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(stopped, "status should follow the crash to false");
    assert!(!h.service.processes().is_alive("a").await);
    assert!(h.emitter.events().iter().any(|e| matches!(
        e,
        AppEvent::McpServerExited { server_id, code: Some(1) } if server_id == "a"
    )));

    // The server can be started again after a crash
    assert!(h.service.toggle_status("a", true).await.unwrap());
    assert!(h.service.processes().is_alive("a").await);

    watcher.abort();
}

#[tokio::test]
async fn shutdown_keeps_recorded_status() {
    let h = Harness::with_config(&echo_config());
    h.service.toggle_status("a", true).await.unwrap();

    h.service.shutdown().await;

    assert!(!h.service.processes().is_alive("a").await);
    assert!(h.service.is_mcp_running("a").await.unwrap());
    assert_eq!(h.connector.live_count(), 0);
}
