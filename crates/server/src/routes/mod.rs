//! API route handlers for the docpipe server.

pub mod health;
pub mod jobs;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET    /api/health    - Health check
/// - POST   /api/jobs      - Create a job and start background processing
/// - GET    /api/jobs      - List jobs (skip/limit pagination)
/// - GET    /api/jobs/{id} - Current job snapshot (status, progress, output)
/// - DELETE /api/jobs/{id} - Request cooperative cancellation
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", jobs::router())
        .with_state(state)
}
