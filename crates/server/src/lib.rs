// crates/server/src/lib.rs
//! Docpipe server library.
//!
//! This crate provides the Axum-based HTTP server for the docpipe backend:
//! the job lifecycle API (create, list, read, cancel) and the background
//! executor that runs each job through the five-stage document pipeline.

pub mod config;
pub mod error;
pub mod jobs;
pub mod routes;
pub mod state;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::Config;
pub use error::*;
pub use jobs::JobExecutor;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, jobs)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
