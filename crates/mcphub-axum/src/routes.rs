//! Route definitions and router construction.
//!
//! Handlers are thin wrappers that delegate to the configuration service.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::bootstrap::{AxumContext, CorsConfig};
use crate::handlers;
use crate::state::AppState;

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    match config {
        CorsConfig::AllowAll => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(%origin, "Ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

/// API routes without the `/api` prefix.
pub(crate) fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/configs", get(handlers::config::list))
        .route(
            "/config",
            get(handlers::config::get).put(handlers::config::save),
        )
        .route("/config/{id}/toggle", post(handlers::config::toggle))
        .route(
            "/config/{id}/capabilities",
            get(handlers::config::capabilities),
        )
        .route("/events", get(handlers::events::stream))
}

/// Create the main router with all routes.
pub fn create_router(ctx: AxumContext, cors: &CorsConfig) -> Router {
    let state: AppState = Arc::new(ctx);

    Router::new().route("/health", get(health_check)).nest(
        "/api",
        api_routes().with_state(state).layer(build_cors_layer(cors)),
    )
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
