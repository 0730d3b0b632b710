// crates/server/src/jobs/mod.rs
//! Background job execution.
//!
//! Provides `JobExecutor` — drives one job at a time through the five-stage
//! pipeline in a detached tokio task, with per-stage progress updates and
//! cooperative cancellation checkpoints.

pub mod executor;

pub use executor::JobExecutor;
