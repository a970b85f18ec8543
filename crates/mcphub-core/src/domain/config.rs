//! Configuration document types.
//!
//! Wire names are camelCase to stay compatible with the JSON documents the
//! web frontend reads and writes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Server URL used by the seeded default document.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Transport advertised to chat clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Tool servers are reached over stdin/stdout
    Stdio,
    /// Tool servers are reached over HTTP
    #[default]
    Http,
}

impl Transport {
    /// Wire names accepted by validation.
    pub const ALLOWED: [&'static str; 2] = ["stdio", "http"];
}

/// Configuration of a single tool server.
///
/// The id is not stored here; it is the key of the entry in
/// [`GlobalConfig::mcp_servers`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Display label. Falls back to [`default_display_name`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Executable name or path. Required to start the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Arguments passed to the executable, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Extra environment variables for the child process.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    /// Working directory for the child process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    /// Desired running flag, written back by user-initiated toggles.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_start: Option<bool>,
}

impl ServerConfig {
    /// Create a server configuration that runs `command` with `args`.
    #[must_use]
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: Some(command.into()),
            args,
            ..Self::default()
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name shown to users for the server stored under `id`.
    pub fn display_name(&self, id: &str) -> String {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .map_or_else(|| default_display_name(id), str::to_string)
    }

    /// The command to run, if one is configured and non-blank.
    pub fn runnable_command(&self) -> Option<&str> {
        self.command.as_deref().filter(|c| !c.trim().is_empty())
    }
}

/// Placeholder display name for a server without a configured name.
pub fn default_display_name(id: &str) -> String {
    format!("MCP配置{id}")
}

/// The singleton configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    /// URL of the chat backend that consumes the tool servers.
    pub server_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<Transport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,

    /// Configured tool servers keyed by id.
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, ServerConfig>,
}

impl GlobalConfig {
    /// Create an empty document pointing at `server_url`.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            transport: None,
            debug: None,
            mcp_servers: BTreeMap::new(),
        }
    }

    /// Add or replace a server entry.
    #[must_use]
    pub fn with_server(mut self, id: impl Into<String>, server: ServerConfig) -> Self {
        self.mcp_servers.insert(id.into(), server);
        self
    }

    /// Look up a server by id.
    pub fn server(&self, id: &str) -> Option<&ServerConfig> {
        self.mcp_servers.get(id)
    }
}

impl Default for GlobalConfig {
    /// The document seeded on first start.
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            transport: Some(Transport::Http),
            debug: Some(false),
            mcp_servers: BTreeMap::new(),
        }
    }
}

/// One row of the configuration list shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpConfigListItem {
    pub id: String,
    pub name: String,
    pub is_running: bool,
}
