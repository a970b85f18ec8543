//! MCP configuration handlers.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use mcphub_core::{GlobalConfig, McpConfigListItem, McpTool};
use serde_json::Value;

use crate::envelope::ApiResponse;
use crate::error::HttpError;
use crate::state::AppState;

type ApiResult<T> = Result<ApiResponse<T>, HttpError>;

/// List configured servers with their recorded running status.
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<McpConfigListItem>> {
    Ok(ApiResponse::success(state.mcp.get_config_list().await?))
}

/// Return the stored configuration document.
pub async fn get(State(state): State<AppState>) -> ApiResult<GlobalConfig> {
    Ok(ApiResponse::success(state.mcp.load_config().await?))
}

/// Replace the configuration document.
pub async fn save(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<GlobalConfig> {
    let Json(doc) = body?;
    Ok(ApiResponse::success(
        state.mcp.save_config_document(&doc).await?,
    ))
}

/// Flip a server's running state and record it as its `autoStart`.
pub async fn toggle(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<bool> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.mcp.toggle_status(&id, true).await?))
}

/// List tools exposed by a running server.
pub async fn capabilities(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> ApiResult<Vec<McpTool>> {
    let Path(id) = id?;
    Ok(ApiResponse::success(state.mcp.capabilities(&id).await?))
}
