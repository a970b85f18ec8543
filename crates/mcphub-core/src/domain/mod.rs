//! MCP hub domain types.
//!
//! These types represent the configuration documents and tool metadata,
//! independent of any infrastructure concerns (files, processes, HTTP).
//!
//! # Design
//!
//! - `GlobalConfig` - The singleton configuration document
//! - `ServerConfig` - One configured tool server, keyed by id in `mcp_servers`
//! - `Transport` - Transport advertised to chat clients (stdio or http)
//! - `McpConfigListItem` - Joined view of config and running status
//! - `McpTool` - Tool exposed by a running tool server

mod config;
mod tool;

pub use config::{
    DEFAULT_SERVER_URL, GlobalConfig, McpConfigListItem, ServerConfig, Transport,
    default_display_name,
};
pub use tool::McpTool;
