//! MCP server lifecycle event constructors.

use super::AppEvent;
use crate::ports::McpErrorInfo;

impl AppEvent {
    /// Create an MCP server started event.
    pub fn mcp_server_started(server_id: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self::McpServerStarted {
            server_id: server_id.into(),
            server_name: server_name.into(),
        }
    }

    /// Create an MCP server stopped event.
    pub fn mcp_server_stopped(server_id: impl Into<String>, server_name: impl Into<String>) -> Self {
        Self::McpServerStopped {
            server_id: server_id.into(),
            server_name: server_name.into(),
        }
    }

    /// Create an MCP server exited (crashed) event.
    pub fn mcp_server_exited(server_id: impl Into<String>, code: Option<i32>) -> Self {
        Self::McpServerExited {
            server_id: server_id.into(),
            code,
        }
    }

    /// Create an MCP server error event.
    pub const fn mcp_server_error(error: McpErrorInfo) -> Self {
        Self::McpServerError { error }
    }

    /// Create a config saved event.
    pub const fn config_saved(server_count: usize) -> Self {
        Self::ConfigSaved { server_count }
    }
}
