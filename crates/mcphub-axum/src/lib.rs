//! Axum web adapter for mcphub.
//!
//! Exposes the configuration service over a small JSON API wrapped in the
//! `{code, message, data}` envelope, plus a server-sent event stream.
//! [`bootstrap`] is the composition root used by the `mcphub` binary.
#![deny(unsafe_code)]

// Used by the binary only
use clap as _;
use dotenvy as _;
use tracing_subscriber as _;

#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use tempfile as _;
#[cfg(test)]
use tower as _;

pub mod bootstrap;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod sse;
pub mod state;

pub use bootstrap::{
    AxumContext, BackgroundTasks, CorsConfig, ServerConfig, bootstrap, from_parts, start_server,
};
pub use envelope::ApiResponse;
pub use error::HttpError;
pub use routes::create_router;
pub use sse::SseBroadcaster;
pub use state::AppState;
