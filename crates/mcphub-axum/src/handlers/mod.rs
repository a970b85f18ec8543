//! HTTP request handlers for the Axum web server.

pub mod config;
pub mod events;
