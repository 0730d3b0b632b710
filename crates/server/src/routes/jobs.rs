// crates/server/src/routes/jobs.rs
//! Job lifecycle API.
//!
//! - POST   /jobs      — Create a job; processing starts in the background
//! - GET    /jobs      — List jobs with skip/limit pagination
//! - GET    /jobs/{id} — Current job snapshot
//! - DELETE /jobs/{id} — Request cooperative cancellation

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use docpipe_db::{CancelOutcome, JobRow};

const DEFAULT_LIST_LIMIT: i64 = 10;

/// Body for POST /api/jobs.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub agent_id: String,
    pub created_by: String,
    #[serde(default)]
    pub input_data: Option<serde_json::Value>,
}

/// Query parameters for GET /api/jobs.
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Response for DELETE /api/jobs/{id}.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct CancelResponse {
    pub message: String,
}

/// POST /api/jobs — Create a job and hand it to the background executor.
///
/// Returns the persisted record immediately; the caller polls GET /jobs/{id}
/// until the status is terminal.
async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<JobRow>)> {
    if body.agent_id.trim().is_empty() {
        return Err(ApiError::BadRequest("agentId must not be empty".into()));
    }
    if body.created_by.trim().is_empty() {
        return Err(ApiError::BadRequest("createdBy must not be empty".into()));
    }

    let job = state
        .db
        .insert_job(&body.agent_id, &body.created_by, body.input_data.as_ref())
        .await?;

    tracing::info!(job_id = %job.id, agent_id = %job.agent_id, "job created");
    state.executor.spawn(job.id.clone());

    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/jobs — List jobs, newest first.
async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> ApiResult<Json<Vec<JobRow>>> {
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if skip < 0 {
        return Err(ApiError::BadRequest("skip must be >= 0".into()));
    }
    if limit <= 0 {
        return Err(ApiError::BadRequest("limit must be > 0".into()));
    }

    let jobs = state.db.list_jobs(skip, limit).await?;
    Ok(Json(jobs))
}

/// GET /api/jobs/{id} — Current job snapshot.
async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobRow>> {
    let job = state
        .db
        .get_job(&id)
        .await?
        .ok_or(ApiError::JobNotFound(id))?;
    Ok(Json(job))
}

/// DELETE /api/jobs/{id} — Request cooperative cancellation.
///
/// The executor observes the cancellation at its next checkpoint, not
/// instantaneously. Rejected with 409 once the job is completed or failed.
async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    match state.db.cancel_job(&id).await? {
        CancelOutcome::Cancelled => {
            tracing::info!(job_id = %id, "job cancellation requested");
            Ok(Json(CancelResponse {
                message: "Job cancelled".to_string(),
            }))
        }
        CancelOutcome::NotFound => Err(ApiError::JobNotFound(id)),
        CancelOutcome::AlreadyTerminal(status) => Err(ApiError::InvalidState(format!(
            "cannot cancel a {status} job"
        ))),
    }
}

/// Build the jobs router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/{id}", get(get_job).delete(cancel_job))
}
