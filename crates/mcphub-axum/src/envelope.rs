//! Response envelope shared by every JSON endpoint.
//!
//! ```json
//! { "code": 0, "message": "success", "data": [...] }
//! { "code": 1, "message": "MCP configuration with ID x not found", "data": null }
//! ```

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Envelope code for a successful call.
pub const CODE_SUCCESS: i32 = 0;
/// Envelope code for a failed call.
pub const CODE_FAILURE: i32 = 1;

/// `{code, message, data}` wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            code: CODE_FAILURE,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
