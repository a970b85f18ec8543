//! Tool-server client port.
//!
//! The process manager never spawns processes itself; it asks an
//! `McpConnector` for a connected session. The stdio implementation lives in
//! `mcphub-mcp`, tests use an in-memory fake.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{McpTool, ServerConfig};
use crate::validation::ConfigValidationError;

/// Errors that can occur while talking to a tool server.
#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("Failed to spawn MCP server process: {0}")]
    SpawnFailed(String),

    #[error("Failed to communicate with MCP server: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("Timeout waiting for MCP server response")]
    Timeout,

    #[error("MCP server returned error: code={code}, message={message}")]
    ServerError { code: i64, message: String },

    #[error("Server not connected")]
    NotConnected,
}

/// What to do with the child's stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StderrMode {
    /// Capture and forward each line to the log
    #[default]
    Pipe,
    /// Share the manager's stderr
    Inherit,
    /// Discard
    Null,
}

/// Everything needed to launch a tool server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<String>,
    pub stderr: StderrMode,
}

impl SpawnSpec {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: BTreeMap::new(),
            cwd: None,
            stderr: StderrMode::default(),
        }
    }

    /// Build the launch spec for the server stored under `id`.
    ///
    /// A server without a command can never run; that is a configuration
    /// problem, reported as a validation error.
    pub fn from_server(id: &str, server: &ServerConfig) -> Result<Self, ConfigValidationError> {
        let command = server.runnable_command().ok_or_else(|| {
            ConfigValidationError::single(format!(
                "MCP server configuration is missing command: {id}"
            ))
        })?;

        Ok(Self {
            command: command.to_string(),
            args: server.args.clone(),
            env: server.env.clone(),
            cwd: server.cwd.clone().filter(|c| !c.trim().is_empty()),
            stderr: StderrMode::Pipe,
        })
    }
}

/// How a tool-server process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Human-readable description (exit status or wait error).
    pub description: String,
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// A connected, capability-negotiated session with a tool server.
#[async_trait]
pub trait McpSession: Send + Sync {
    /// List the tools the server exposes.
    async fn list_tools(&self) -> Result<Vec<McpTool>, McpClientError>;

    /// Disconnect and release the underlying process.
    ///
    /// Idempotent; must not fail for a process that is already gone.
    async fn disconnect(&self);

    /// OS process id, when there is one.
    fn pid(&self) -> Option<u32> {
        None
    }
}

/// Result of a successful connect.
pub struct McpConnection {
    pub session: Arc<dyn McpSession>,
    /// Resolves when the process exits on its own. Dropped without a value
    /// when the session is disconnected deliberately.
    pub exited: oneshot::Receiver<ProcessExit>,
}

impl fmt::Debug for McpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpConnection")
            .field("pid", &self.session.pid())
            .finish_non_exhaustive()
    }
}

/// Spawns a tool server and performs the handshake.
#[async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self, spec: &SpawnSpec) -> Result<McpConnection, McpClientError>;
}
