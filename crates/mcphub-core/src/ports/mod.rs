//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No file layout or process details in any signature
//! - Storage traits are minimal: whole-document load/save, per-id status
//! - The tool-server client is reached only through `McpConnector`

pub mod event_emitter;
pub mod mcp_connector;
pub mod mcp_error;
pub mod storage;

pub use event_emitter::{AppEventEmitter, NoopEmitter};
pub use mcp_connector::{
    McpClientError, McpConnection, McpConnector, McpSession, ProcessExit, SpawnSpec, StderrMode,
};
pub use mcp_error::{McpErrorCategory, McpErrorInfo, McpServiceError};
pub use storage::{ConfigRepository, StatusMap, StatusRepository, StorageError, StoreInit};
