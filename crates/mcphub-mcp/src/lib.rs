//! MCP tool-server management for mcphub.
//!
//! - [`client`]: stdio JSON-RPC client implementing the `McpConnector` port
//! - [`ProcessManager`]: owns live server handles and detects crashes
//! - [`StatusTracker`]: durable running-status view
//! - [`McpConfigService`]: orchestrates configuration, status and processes
#![deny(unsafe_code)]

pub mod client;
pub mod locks;
pub mod manager;
pub mod service;
pub mod status;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use client::{StdioConnector, StdioSession};
pub use locks::KeyedLocks;
pub use manager::{
    DEFAULT_HANDSHAKE_TIMEOUT, McpManagerError, ProcessManager, ServerExit,
};
pub use service::{McpConfigService, SweepFailure, SweepReport};
pub use status::StatusTracker;

#[cfg(any(test, feature = "test-utils"))]
pub use testing::FakeConnector;
