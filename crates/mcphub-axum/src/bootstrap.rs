//! Axum server bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the web adapter. All concrete implementations are instantiated here.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mcphub_core::{AppEventEmitter, ConfigRepository, StatusRepository};
use mcphub_mcp::{DEFAULT_HANDSHAKE_TIMEOUT, McpConfigService, ProcessManager, StdioConnector};
use mcphub_store::{FileStore, StoreOptions, spawn_backup_task};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::sse::SseBroadcaster;

/// CORS configuration for the web server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CorsConfig {
    /// Allow all origins (development mode).
    #[default]
    AllowAll,
    /// Allow specific origins (production mode).
    AllowOrigins(Vec<String>),
}

/// Server configuration for the Axum adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub addr: SocketAddr,
    /// Data directory and backup policy.
    pub store: StoreOptions,
    /// Upper bound on a tool server's spawn and handshake.
    pub handshake_timeout: Duration,
    pub cors: CorsConfig,
}

impl ServerConfig {
    pub fn new(addr: SocketAddr, store: StoreOptions) -> Self {
        Self {
            addr,
            store,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            cors: CorsConfig::default(),
        }
    }

    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set CORS to allow specific origins. An empty list allows all.
    #[must_use]
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.cors = if origins.is_empty() {
            CorsConfig::AllowAll
        } else {
            CorsConfig::AllowOrigins(origins)
        };
        self
    }
}

/// Long-running tasks spawned by bootstrap.
#[derive(Debug, Default)]
pub struct BackgroundTasks(Vec<JoinHandle<()>>);

impl BackgroundTasks {
    fn push(&mut self, task: JoinHandle<()>) {
        self.0.push(task);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Cancel every task and wait for it to finish.
    pub async fn shutdown(self) {
        for task in &self.0 {
            task.abort();
        }
        for task in self.0 {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Background task failed");
                }
            }
        }
    }
}

/// Application context for the Axum adapter.
pub struct AxumContext {
    /// Configuration service for MCP tool servers.
    pub mcp: Arc<McpConfigService>,
    /// SSE broadcaster for real-time events.
    pub sse: Arc<SseBroadcaster>,
    /// Exit watcher and backup timer.
    pub tasks: BackgroundTasks,
}

/// Assemble the service graph from already constructed parts.
///
/// Starts the exit watcher so crashed servers are recorded as stopped.
pub fn from_parts(
    config_repo: Arc<dyn ConfigRepository>,
    status_repo: Arc<dyn StatusRepository>,
    processes: ProcessManager,
) -> AxumContext {
    let sse = Arc::new(SseBroadcaster::with_defaults());

    let mcp = Arc::new(McpConfigService::new(
        config_repo,
        status_repo,
        Arc::new(processes),
        sse.clone() as Arc<dyn AppEventEmitter>,
    ));
    let mut tasks = BackgroundTasks::default();
    tasks.push(mcp.spawn_exit_watcher());

    AxumContext { mcp, sse, tasks }
}

/// Bootstrap the file store, the process manager and the configuration
/// service, then restart every server recorded as running.
pub async fn bootstrap(config: &ServerConfig) -> Result<AxumContext> {
    // 1. Prepare the data directory
    let store = Arc::new(FileStore::new(config.store.clone()));
    let init = store
        .initialize()
        .await
        .context("Failed to initialize the data directory")?;

    tracing::info!(
        target: "mcphub.paths",
        data_dir = %config.store.data_dir.display(),
        seeded_config = init.seeded_config,
        seeded_status = init.seeded_status,
        migrated_status = init.migrated_status,
        auto_start = init.auto_start.len(),
        "Store initialized"
    );

    // 2. Process manager over real child processes
    let processes = ProcessManager::new(Arc::new(StdioConnector::new()))
        .with_handshake_timeout(config.handshake_timeout);

    // 3. Service with SSE emitter
    let mut ctx = from_parts(store.clone(), store.clone(), processes);

    // 4. Periodic backups
    ctx.tasks.push(spawn_backup_task(store));

    // 5. Recover servers that were running before the last shutdown.
    // A broken configuration must not keep the API from coming up.
    if let Err(e) = ctx.mcp.auto_start_recovery_sweep().await {
        tracing::warn!(error = %e, "Auto-start recovery sweep failed");
    }

    Ok(ctx)
}

/// Start the web server and run it until Ctrl-C.
///
/// Live tool servers are stopped on the way out; their recorded status is
/// kept for the next start. Background tasks are cancelled last.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let mut ctx = bootstrap(&config).await?;
    let mcp = Arc::clone(&ctx.mcp);
    let tasks = std::mem::take(&mut ctx.tasks);
    let app = crate::routes::create_router(ctx, &config.cors);

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    tracing::info!("mcphub listening on http://{}", config.addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    mcp.shutdown().await;
    tasks.shutdown().await;
    tracing::info!("mcphub stopped");

    served.context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
