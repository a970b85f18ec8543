//! MCP service error types.
//!
//! This module defines service-level errors for MCP operations.

use thiserror::Error;

use super::StorageError;
use crate::validation::ConfigValidationError;

/// Domain-specific errors for MCP service operations.
///
/// This error type wraps storage and validation errors and adds service-level
/// failure modes without leaking infrastructure details (OS process errors,
/// file layout, etc.).
#[derive(Debug, Error)]
pub enum McpServiceError {
    /// The configuration document violates one or more rules.
    #[error(transparent)]
    Validation(#[from] ConfigValidationError),

    /// Persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No server with this id is configured.
    #[error("MCP configuration with ID {0} not found")]
    NotFound(String),

    /// Server process failed to spawn or complete the handshake.
    #[error("Failed to start MCP server {id}: {reason}")]
    StartFailed { id: String, reason: String },

    /// Server is not running (e.g., when querying capabilities).
    #[error("MCP server not running: {0}")]
    NotRunning(String),

    /// Internal service error.
    #[error("Internal MCP error: {0}")]
    Internal(String),
}

impl McpServiceError {
    /// Whether the caller caused this error (bad input, unknown id, wrong
    /// state) rather than the system.
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::NotRunning(_)
        )
    }
}

/// User-safe error information for MCP events.
///
/// This type is used in `AppEvent::McpServerError` to provide error details
/// that are safe to display to users (no raw process or I/O errors).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpErrorInfo {
    /// Id of the MCP server.
    pub server_id: String,

    /// User-friendly error message.
    pub message: String,

    /// Error category for UI handling.
    pub category: McpErrorCategory,
}

/// Categories of MCP errors for UI handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpErrorCategory {
    /// Server process lifecycle error.
    Process,
    /// Configuration error.
    Configuration,
    /// Persistence error.
    Storage,
    /// Unknown/internal error.
    Unknown,
}

impl McpErrorInfo {
    /// Build error info for `server_id` from a service error.
    pub fn from_error(server_id: impl Into<String>, error: &McpServiceError) -> Self {
        Self {
            server_id: server_id.into(),
            message: error.to_string(),
            category: error.into(),
        }
    }
}

impl From<&McpServiceError> for McpErrorCategory {
    fn from(error: &McpServiceError) -> Self {
        match error {
            McpServiceError::Validation(_) | McpServiceError::NotFound(_) => Self::Configuration,
            McpServiceError::Storage(_) => Self::Storage,
            McpServiceError::StartFailed { .. } | McpServiceError::NotRunning(_) => Self::Process,
            McpServiceError::Internal(_) => Self::Unknown,
        }
    }
}
