//! Axum-specific error types and mappings.
//!
//! Every failure is rendered as a `code = 1` envelope. Caller mistakes map
//! to 400, everything else to 500.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mcphub_core::McpServiceError;
use thiserror::Error;

use crate::envelope::ApiResponse;

/// Axum-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Bad request (invalid body, invalid document, unknown id).
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl HttpError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, ApiResponse::<()>::failure(self.to_string())).into_response()
    }
}

impl From<McpServiceError> for HttpError {
    fn from(err: McpServiceError) -> Self {
        if err.is_caller_error() {
            Self::BadRequest(err.to_string())
        } else {
            tracing::error!(error = %err, "Request failed");
            Self::Internal(err.to_string())
        }
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for HttpError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
