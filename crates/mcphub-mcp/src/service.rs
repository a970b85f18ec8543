//! High-level configuration service for managing MCP servers.
//!
//! This service provides the API used by the REST endpoints. It owns the
//! per-id locking that keeps configuration, durable status and live
//! processes consistent, and uses dependency injection for the repositories,
//! the process manager and the event emitter.

use std::sync::{Arc, Weak};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use mcphub_core::{
    AppEvent, AppEventEmitter, ConfigRepository, GlobalConfig, McpConfigListItem, McpErrorInfo,
    McpServiceError, McpTool, ServerConfig, SpawnSpec, StatusRepository, ValidationReport,
    parse_document, validate_config, validate_document,
};

use crate::locks::KeyedLocks;
use crate::manager::{ProcessManager, ServerExit};
use crate::status::StatusTracker;

/// A server the recovery sweep could not start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub id: String,
    pub error: String,
}

/// Outcome of [`McpConfigService::auto_start_recovery_sweep`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Ids started (or already running).
    pub started: Vec<String>,
    /// Ids that failed to start; their status is left as recorded.
    pub failed: Vec<SweepFailure>,
    /// Ids recorded as running but no longer configured.
    pub orphaned: Vec<String>,
}

/// Configuration service for MCP tool servers.
///
/// Operations on the same server id are serialized; operations on
/// different ids run concurrently. Every write of the configuration
/// document goes through one lock.
pub struct McpConfigService {
    config_repo: Arc<dyn ConfigRepository>,
    status: StatusTracker,
    processes: Arc<ProcessManager>,
    emitter: Arc<dyn AppEventEmitter>,
    locks: KeyedLocks,
    config_lock: Mutex<()>,
}

impl McpConfigService {
    /// Create a new service with injected dependencies.
    pub fn new(
        config_repo: Arc<dyn ConfigRepository>,
        status_repo: Arc<dyn StatusRepository>,
        processes: Arc<ProcessManager>,
        emitter: Arc<dyn AppEventEmitter>,
    ) -> Self {
        Self {
            config_repo,
            status: StatusTracker::new(status_repo),
            processes,
            emitter,
            locks: KeyedLocks::new(),
            config_lock: Mutex::new(()),
        }
    }

    pub const fn processes(&self) -> &Arc<ProcessManager> {
        &self.processes
    }

    // ========== Configuration ==========

    /// Validate a raw configuration document without saving it.
    pub fn validate_config(&self, doc: &Value) -> ValidationReport {
        validate_document(doc)
    }

    /// Validate and persist a typed configuration document.
    ///
    /// Nothing is written if validation fails.
    pub async fn save_config(&self, config: &GlobalConfig) -> Result<(), McpServiceError> {
        validate_config(config).into_result()?;
        {
            let _config = self.config_lock.lock().await;
            self.persist(config).await?;
        }
        self.emitter
            .emit(AppEvent::config_saved(config.mcp_servers.len()));
        tracing::info!(servers = config.mcp_servers.len(), "Configuration saved");
        Ok(())
    }

    /// Validate and persist a raw JSON configuration document.
    ///
    /// Returns the typed document that was stored.
    pub async fn save_config_document(&self, doc: &Value) -> Result<GlobalConfig, McpServiceError> {
        let config = parse_document(doc)?;
        self.save_config(&config).await?;
        Ok(config)
    }

    /// Load and re-validate the stored configuration document.
    pub async fn load_config(&self) -> Result<GlobalConfig, McpServiceError> {
        let doc = self.config_repo.load_config().await?;
        Ok(parse_document(&doc)?)
    }

    async fn persist(&self, config: &GlobalConfig) -> Result<(), McpServiceError> {
        let doc = serde_json::to_value(config)
            .map_err(|e| McpServiceError::Internal(format!("Failed to serialize config: {e}")))?;
        self.config_repo.save_config(&doc).await?;
        Ok(())
    }

    // ========== Status ==========

    /// Every configured server with its recorded running status, sorted by id.
    pub async fn get_config_list(&self) -> Result<Vec<McpConfigListItem>, McpServiceError> {
        let config = self.load_config().await?;
        let status = self.status.get_all_status().await?;

        Ok(config
            .mcp_servers
            .iter()
            .map(|(id, server)| McpConfigListItem {
                id: id.clone(),
                name: server.display_name(id),
                is_running: status.get(id).copied().unwrap_or(false),
            })
            .collect())
    }

    /// Whether `id` is recorded as running.
    pub async fn is_mcp_running(&self, id: &str) -> Result<bool, McpServiceError> {
        Ok(self.status.get_status(id).await?)
    }

    /// Flip the running state of `id` and return the new state.
    ///
    /// Starting requires a configured command. When `update_config_file` is
    /// set, the new state is also written to the server's `autoStart` field.
    /// If starting fails the recorded status is left unchanged.
    pub async fn toggle_status(
        &self,
        id: &str,
        update_config_file: bool,
    ) -> Result<bool, McpServiceError> {
        let _guard = self.locks.lock(id).await;

        let config = self.load_config().await?;
        let server = config
            .server(id)
            .cloned()
            .ok_or_else(|| McpServiceError::NotFound(id.to_string()))?;
        let name = server.display_name(id);

        let running = !self.status.get_status(id).await?;

        if running {
            if let Err(e) = self.start_server(id, &server).await {
                self.emit_error(id, &e);
                return Err(e);
            }
        } else {
            self.processes.stop(id).await;
        }

        if let Err(e) = self.status.set_status(id, running).await {
            if running {
                // Keep the live state in line with the unchanged record
                self.processes.stop(id).await;
            }
            let e = McpServiceError::from(e);
            self.emit_error(id, &e);
            return Err(e);
        }

        if update_config_file {
            self.write_auto_start(id, running).await?;
        }

        if running {
            self.emitter.emit(AppEvent::mcp_server_started(id, &name));
        } else {
            self.emitter.emit(AppEvent::mcp_server_stopped(id, &name));
        }
        tracing::info!(server_id = %id, running, "Toggled MCP server");

        Ok(running)
    }

    /// Record `running` as the `autoStart` of `id` in the current document.
    ///
    /// The document is re-read under the config lock so that saves made
    /// while the server was starting are kept.
    async fn write_auto_start(&self, id: &str, running: bool) -> Result<(), McpServiceError> {
        let _config = self.config_lock.lock().await;

        let mut config = self.load_config().await?;
        let Some(entry) = config.mcp_servers.get_mut(id) else {
            tracing::warn!(server_id = %id, "MCP server removed while toggling; autoStart not written");
            return Ok(());
        };
        if entry.auto_start == Some(running) {
            return Ok(());
        }
        entry.auto_start = Some(running);
        self.persist(&config).await
    }

    async fn start_server(&self, id: &str, server: &ServerConfig) -> Result<(), McpServiceError> {
        let spec = SpawnSpec::from_server(id, server)?;
        self.processes.start(id, &spec).await?;
        Ok(())
    }

    // ========== Capabilities ==========

    /// Tools exposed by a running server.
    pub async fn capabilities(&self, id: &str) -> Result<Vec<McpTool>, McpServiceError> {
        Ok(self.processes.list_capabilities(id).await?)
    }

    // ========== Lifecycle ==========

    /// Start every server recorded as running.
    ///
    /// Neither the recorded status nor the configuration document is
    /// changed. A server that fails to start is reported and skipped.
    pub async fn auto_start_recovery_sweep(&self) -> Result<SweepReport, McpServiceError> {
        let config = self.load_config().await?;
        let status = self.status.get_all_status().await?;
        let mut report = SweepReport::default();

        for id in status
            .into_iter()
            .filter_map(|(id, running)| running.then_some(id))
        {
            let Some(server) = config.server(&id) else {
                tracing::warn!(server_id = %id, "Skipping auto-start for unconfigured MCP server");
                report.orphaned.push(id);
                continue;
            };

            let _guard = self.locks.lock(&id).await;
            match self.start_server(&id, server).await {
                Ok(()) => {
                    self.emitter
                        .emit(AppEvent::mcp_server_started(&id, server.display_name(&id)));
                    report.started.push(id);
                }
                Err(e) => {
                    tracing::warn!(server_id = %id, error = %e, "Failed to auto-start MCP server");
                    self.emit_error(&id, &e);
                    report.failed.push(SweepFailure {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            started = report.started.len(),
            failed = report.failed.len(),
            orphaned = report.orphaned.len(),
            "Auto-start recovery sweep complete"
        );
        Ok(report)
    }

    /// Record `false` for servers whose process exits on its own.
    ///
    /// The task ends when the service is dropped.
    pub fn spawn_exit_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let mut exits = self.processes.subscribe_exits();
        let service: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                let received = exits.recv().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                match received {
                    Ok(exit) => service.handle_exit(exit).await,
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Exit watcher lagged; reconciling all servers");
                        service.reconcile_dead().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn handle_exit(&self, exit: ServerExit) {
        let id = exit.id.as_str();
        let _guard = self.locks.lock(id).await;

        // Restarted since the exit was reported
        if self.processes.is_alive(id).await {
            return;
        }

        if let Err(e) = self.status.set_status(id, false).await {
            tracing::error!(server_id = %id, error = %e, "Failed to record MCP server exit");
            self.emit_error(id, &e.into());
            return;
        }

        self.emitter
            .emit(AppEvent::mcp_server_exited(id, exit.exit.code));
    }

    async fn reconcile_dead(&self) {
        let status = match self.status.get_all_status().await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load status for reconciliation");
                return;
            }
        };

        for (id, _) in status.into_iter().filter(|(_, running)| *running) {
            let _guard = self.locks.lock(&id).await;
            if self.processes.is_alive(&id).await {
                continue;
            }
            match self.status.set_status(&id, false).await {
                Ok(()) => self.emitter.emit(AppEvent::mcp_server_exited(&id, None)),
                Err(e) => tracing::error!(server_id = %id, error = %e, "Failed to record MCP server exit"),
            }
        }
    }

    /// Stop every live server.
    ///
    /// Recorded status is kept so the next start can recover the same set.
    pub async fn shutdown(&self) {
        self.processes.stop_all().await;
    }

    fn emit_error(&self, id: &str, error: &McpServiceError) {
        self.emitter
            .emit(AppEvent::mcp_server_error(McpErrorInfo::from_error(id, error)));
    }
}
