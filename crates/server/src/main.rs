// crates/server/src/main.rs
//! Docpipe server binary.
//!
//! Opens the job database, builds the stage invoker from environment
//! configuration, and serves the job lifecycle API. Job execution happens
//! in detached tokio tasks spawned per created job.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use docpipe_db::Database;
use docpipe_pipeline::HttpStageInvoker;
use docpipe_server::{create_app, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config = Config::from_env();

    let db = match &config.db_path {
        Some(path) => Database::new(path).await?,
        None => Database::open_default().await?,
    };

    let invoker = Arc::new(HttpStageInvoker::new(config.invoker.clone())?);
    let state = AppState::new(db, invoker, config.max_concurrent_jobs);
    let app = create_app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "docpipe listening");

    axum::serve(listener, app).await?;

    Ok(())
}
