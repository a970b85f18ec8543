//! Canonical event union for everything the hub broadcasts.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag for TypeScript compatibility:
//!
//! ```json
//! { "type": "mcp_server_started", "serverId": "fs", "serverName": "Files" }
//! ```

mod mcp;

use serde::{Deserialize, Serialize};

use crate::ports::McpErrorInfo;

/// Canonical event types for all adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A tool server completed its handshake and is running.
    McpServerStarted {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverName")]
        server_name: String,
    },

    /// A tool server was stopped on request.
    McpServerStopped {
        #[serde(rename = "serverId")]
        server_id: String,
        #[serde(rename = "serverName")]
        server_name: String,
    },

    /// A tool server process exited without being asked to.
    McpServerExited {
        #[serde(rename = "serverId")]
        server_id: String,
        /// Exit code, when the process exited normally.
        code: Option<i32>,
    },

    /// An operation on a tool server failed.
    McpServerError { error: McpErrorInfo },

    /// The configuration document was replaced.
    ConfigSaved {
        #[serde(rename = "serverCount")]
        server_count: usize,
    },
}
