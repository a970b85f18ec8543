//! Core domain types, validation and port definitions for mcphub.
//!
//! This crate has no knowledge of files, processes or HTTP. Storage, the
//! tool-server client and event delivery are reached through the traits in
//! [`ports`]; adapters live in `mcphub-store`, `mcphub-mcp` and `mcphub-axum`.
#![deny(unsafe_code)]

pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod validation;

// Re-export commonly used types for convenience
pub use domain::{
    DEFAULT_SERVER_URL, GlobalConfig, McpConfigListItem, McpTool, ServerConfig, Transport,
    default_display_name,
};
pub use events::AppEvent;
pub use ports::{
    AppEventEmitter, ConfigRepository, McpClientError, McpConnection, McpConnector,
    McpErrorCategory, McpErrorInfo, McpServiceError, McpSession, NoopEmitter, ProcessExit,
    SpawnSpec, StatusMap, StatusRepository, StderrMode, StorageError, StoreInit,
};
pub use validation::{
    ConfigValidationError, ValidationReport, parse_document, validate_config, validate_document,
};
