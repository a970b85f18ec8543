//! MCP server lifecycle management.
//!
//! Manages starting, stopping, and monitoring MCP server processes.
//! This module depends only on core ports - processes are spawned by the
//! `McpConnector`, never directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{RwLock, broadcast};
use tracing::Instrument;

use mcphub_core::{
    McpClientError, McpConnection, McpConnector, McpServiceError, McpSession, McpTool,
    ProcessExit, SpawnSpec,
};

use crate::locks::KeyedLocks;

/// Default bound on spawn + handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Capacity of the exit broadcast channel.
const EXIT_CHANNEL_CAPACITY: usize = 64;

/// Errors that can occur during MCP manager operations.
#[derive(Debug, Error)]
pub enum McpManagerError {
    #[error("Failed to start MCP server {id}: {reason}")]
    StartFailed { id: String, reason: String },

    #[error("MCP server not running: {0}")]
    NotRunning(String),

    #[error("Client error: {0}")]
    Client(#[from] McpClientError),
}

impl From<McpManagerError> for McpServiceError {
    fn from(err: McpManagerError) -> Self {
        match err {
            McpManagerError::StartFailed { id, reason } => Self::StartFailed { id, reason },
            McpManagerError::NotRunning(id) => Self::NotRunning(id),
            McpManagerError::Client(e) => Self::Internal(e.to_string()),
        }
    }
}

/// A tool server process that ended without being stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerExit {
    pub id: String,
    /// Generation of the handle that exited.
    pub generation: u64,
    pub exit: ProcessExit,
}

/// Live handle for a started server.
struct LiveHandle {
    generation: u64,
    session: Arc<dyn McpSession>,
    started_at: DateTime<Utc>,
}

/// Owner of every live tool-server handle.
///
/// This manager handles starting, stopping, and querying tool servers. It
/// holds no persisted state - recording status is the orchestrator's job.
///
/// At most one handle exists per id. Each handle carries a generation
/// number so that an exit reported for a handle that has since been
/// replaced is ignored.
pub struct ProcessManager {
    connector: Arc<dyn McpConnector>,
    handles: Arc<RwLock<HashMap<String, LiveHandle>>>,
    locks: KeyedLocks,
    next_generation: AtomicU64,
    handshake_timeout: Duration,
    exits: broadcast::Sender<ServerExit>,
}

impl ProcessManager {
    pub fn new(connector: Arc<dyn McpConnector>) -> Self {
        let (exits, _) = broadcast::channel(EXIT_CHANNEL_CAPACITY);
        Self {
            connector,
            handles: Arc::new(RwLock::new(HashMap::new())),
            locks: KeyedLocks::new(),
            next_generation: AtomicU64::new(1),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            exits,
        }
    }

    /// Override the spawn + handshake timeout.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Start the server `id`. A no-op success if it is already running.
    ///
    /// On failure no handle is registered and the child (if any) has been
    /// killed.
    pub async fn start(&self, id: &str, spec: &SpawnSpec) -> Result<(), McpManagerError> {
        let _guard = self.locks.lock(id).await;

        if self.handles.read().await.contains_key(id) {
            tracing::debug!(server_id = %id, "MCP server already running");
            return Ok(());
        }

        let span = tracing::info_span!("mcp_server", server_id = %id);
        let connect = self.connector.connect(spec).instrument(span.clone());
        let connection = match tokio::time::timeout(self.handshake_timeout, connect).await {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                return Err(McpManagerError::StartFailed {
                    id: id.to_string(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(McpManagerError::StartFailed {
                    id: id.to_string(),
                    reason: format!(
                        "handshake timed out after {}s",
                        self.handshake_timeout.as_secs_f32()
                    ),
                });
            }
        };

        let McpConnection { session, exited } = connection;
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let pid = session.pid();

        self.handles.write().await.insert(
            id.to_string(),
            LiveHandle {
                generation,
                session,
                started_at: Utc::now(),
            },
        );
        self.spawn_exit_watch(id.to_string(), generation, exited, span);

        tracing::info!(server_id = %id, pid = ?pid, generation, "MCP server started");
        Ok(())
    }

    fn spawn_exit_watch(
        &self,
        id: String,
        generation: u64,
        exited: tokio::sync::oneshot::Receiver<ProcessExit>,
        span: tracing::Span,
    ) {
        let handles = Arc::clone(&self.handles);
        let exits = self.exits.clone();

        tokio::spawn(
            async move {
                // Closed without a value: the session was disconnected on purpose
                let Ok(exit) = exited.await else {
                    return;
                };

                let removed = {
                    let mut handles = handles.write().await;
                    if handles.get(&id).is_some_and(|h| h.generation == generation) {
                        handles.remove(&id)
                    } else {
                        None
                    }
                };

                let Some(handle) = removed else {
                    tracing::debug!(generation, "Ignoring exit of replaced handle");
                    return;
                };

                tracing::warn!(exit = %exit, "MCP server exited unexpectedly");
                handle.session.disconnect().await;
                let _ = exits.send(ServerExit {
                    id,
                    generation,
                    exit,
                });
            }
            .instrument(span),
        );
    }

    /// Stop the server `id`. A no-op if it is not running.
    pub async fn stop(&self, id: &str) {
        let _guard = self.locks.lock(id).await;

        let Some(handle) = self.handles.write().await.remove(id) else {
            tracing::debug!(server_id = %id, "MCP server already stopped");
            return;
        };

        handle.session.disconnect().await;

        let uptime = Utc::now() - handle.started_at;
        tracing::info!(
            server_id = %id,
            uptime_secs = uptime.num_seconds(),
            "MCP server stopped"
        );
    }

    /// Stop every running server.
    pub async fn stop_all(&self) {
        let drained: Vec<(String, LiveHandle)> = self.handles.write().await.drain().collect();
        for (id, handle) in drained {
            handle.session.disconnect().await;
            tracing::info!(server_id = %id, "MCP server stopped");
        }
    }

    /// List the tools of a running server.
    pub async fn list_capabilities(&self, id: &str) -> Result<Vec<McpTool>, McpManagerError> {
        let session = {
            let handles = self.handles.read().await;
            let handle = handles
                .get(id)
                .ok_or_else(|| McpManagerError::NotRunning(id.to_string()))?;
            Arc::clone(&handle.session)
        };

        Ok(session.list_tools().await?)
    }

    /// Whether a live handle exists for `id`.
    pub async fn is_alive(&self, id: &str) -> bool {
        self.handles.read().await.contains_key(id)
    }

    /// Ids with a live handle, sorted.
    pub async fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Subscribe to unexpected process exits.
    pub fn subscribe_exits(&self) -> broadcast::Receiver<ServerExit> {
        self.exits.subscribe()
    }
}
