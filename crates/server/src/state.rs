// crates/server/src/state.rs
//! Application state for the Axum server.

use crate::jobs::JobExecutor;
use docpipe_db::Database;
use docpipe_pipeline::StageInvoker;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Database handle for job queries.
    pub db: Database,
    /// Background executor that drives jobs through the pipeline.
    pub executor: JobExecutor,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(
        db: Database,
        invoker: Arc<dyn StageInvoker>,
        max_concurrent_jobs: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            db: db.clone(),
            executor: JobExecutor::new(db, invoker, max_concurrent_jobs),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
