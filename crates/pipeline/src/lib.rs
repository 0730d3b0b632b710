// crates/pipeline/src/lib.rs
//! The fixed five-stage text pipeline and its external model invoker.
//!
//! Provides:
//! - `Stage` — the ordered set of pipeline stages
//! - `StageInvoker` — trait seam between the executor and the model endpoint
//! - `HttpStageInvoker` — reqwest implementation against an inference API
//! - `StageError` — stage invocation failures

mod invoker;
mod stage;

pub use invoker::{HttpStageInvoker, InvokerConfig, StageInvoker};
pub use stage::Stage;

use thiserror::Error;

/// Failure of a single stage invocation.
///
/// The invoker never retries; retry policy, if any, belongs to the caller.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("{stage} stage request failed: {source}")]
    Request {
        stage: &'static str,
        source: reqwest::Error,
    },

    #[error("{stage} stage returned HTTP {status}")]
    Status {
        stage: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("{stage} stage returned an unusable response: {message}")]
    InvalidResponse {
        stage: &'static str,
        message: String,
    },

    #[error("{stage} stage returned empty output")]
    EmptyOutput { stage: &'static str },
}

impl StageError {
    /// Name of the stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            StageError::Request { stage, .. }
            | StageError::Status { stage, .. }
            | StageError::InvalidResponse { stage, .. }
            | StageError::EmptyOutput { stage } => stage,
        }
    }
}
