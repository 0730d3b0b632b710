//! Job store queries.
//!
//! Every mutation that changes `status` is a compare-and-swap UPDATE guarded
//! by the current status, so concurrent callers (the executor task, the
//! cancel endpoint, a duplicate trigger) can never double-claim a job or
//! overwrite a terminal state.

use crate::status::JobStatus;
use crate::{Database, DbError, DbResult};
use serde::Serialize;
use serde_json::Value;

/// A persisted job record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRow {
    pub id: String,
    pub agent_id: String,
    pub created_by: String,
    pub input_data: Option<Value>,
    pub output_data: Option<Value>,
    pub status: JobStatus,
    pub progress: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Result of a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was moved to `cancelled`.
    Cancelled,
    /// No job with that id exists.
    NotFound,
    /// The job is already `completed`, `failed`, or `cancelled`.
    AlreadyTerminal(JobStatus),
}

type JobTuple = (
    String,         // id
    String,         // agent_id
    String,         // created_by
    Option<String>, // input_data
    Option<String>, // output_data
    String,         // status
    i64,            // progress
    String,         // created_at
    String,         // updated_at
);

const JOB_COLUMNS: &str =
    "id, agent_id, created_by, input_data, output_data, status, progress, created_at, updated_at";

fn row_to_job(row: JobTuple) -> DbResult<JobRow> {
    let (id, agent_id, created_by, input_data, output_data, status, progress, created_at, updated_at) =
        row;
    let status = JobStatus::parse(&status).ok_or_else(|| DbError::InvalidStatus {
        id: id.clone(),
        value: status.clone(),
    })?;
    let parse_json = |text: Option<String>| -> DbResult<Option<Value>> {
        text.map(|t| serde_json::from_str(&t))
            .transpose()
            .map_err(|source| DbError::InvalidJson {
                id: id.clone(),
                source,
            })
    };
    let input_data = parse_json(input_data)?;
    let output_data = parse_json(output_data)?;
    Ok(JobRow {
        id,
        agent_id,
        created_by,
        input_data,
        output_data,
        status,
        progress,
        created_at,
        updated_at,
    })
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Database {
    /// Persist a new job in `pending` status with `progress = 0`.
    pub async fn insert_job(
        &self,
        agent_id: &str,
        created_by: &str,
        input_data: Option<&Value>,
    ) -> DbResult<JobRow> {
        let id = uuid::Uuid::new_v4().to_string();
        let timestamp = now();
        let input_text = input_data.map(|v| v.to_string());

        sqlx::query(
            "INSERT INTO jobs (id, agent_id, created_by, input_data, status, progress, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 'pending', 0, ?, ?)",
        )
        .bind(&id)
        .bind(agent_id)
        .bind(created_by)
        .bind(&input_text)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(self.pool())
        .await?;

        Ok(JobRow {
            id,
            agent_id: agent_id.to_string(),
            created_by: created_by.to_string(),
            input_data: input_data.cloned(),
            output_data: None,
            status: JobStatus::Pending,
            progress: 0,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        })
    }

    /// Point read of a single job.
    pub async fn get_job(&self, id: &str) -> DbResult<Option<JobRow>> {
        let row: Option<JobTuple> =
            sqlx::query_as(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        row.map(row_to_job).transpose()
    }

    /// List jobs, newest first, with offset/limit pagination.
    pub async fn list_jobs(&self, skip: i64, limit: i64) -> DbResult<Vec<JobRow>> {
        let rows: Vec<JobTuple> = sqlx::query_as(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, id LIMIT ? OFFSET ?"
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(row_to_job).collect()
    }

    /// Claim a pending job for execution: `pending → running`.
    ///
    /// True compare-and-swap — returns whether this caller won the claim.
    /// Exactly one of any number of concurrent callers sees `true`.
    pub async fn claim_job(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'running', progress = 0, updated_at = ? \
             WHERE id = ? AND status = 'pending'",
        )
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Unconditional progress update. Only the claim owner may call this.
    pub async fn update_progress(&self, id: &str, progress: i64) -> DbResult<()> {
        sqlx::query("UPDATE jobs SET progress = ?, updated_at = ? WHERE id = ?")
            .bind(progress)
            .bind(now())
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Finalize a job: `running → completed` with `progress = 100`, atomically.
    ///
    /// Returns `false` (writing nothing) if the status changed underneath,
    /// i.e. a cancellation landed after the last stage. `cancelled` is never
    /// overwritten.
    pub async fn complete_job(&self, id: &str, output_data: &Value) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'completed', progress = 100, output_data = ?, updated_at = ? \
             WHERE id = ? AND status = 'running'",
        )
        .bind(output_data.to_string())
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Record a failure: `running → failed` with the error description.
    ///
    /// Same CAS semantics as [`Database::complete_job`].
    pub async fn fail_job(&self, id: &str, error_message: &str) -> DbResult<bool> {
        let output = serde_json::json!({ "error": error_message });
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', output_data = ?, updated_at = ? \
             WHERE id = ? AND status = 'running'",
        )
        .bind(output.to_string())
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Request cooperative cancellation: `pending | running → cancelled`.
    pub async fn cancel_job(&self, id: &str) -> DbResult<CancelOutcome> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'cancelled', updated_at = ? \
             WHERE id = ? AND status IN ('pending', 'running')",
        )
        .bind(now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 1 {
            return Ok(CancelOutcome::Cancelled);
        }
        match self.get_job(id).await? {
            Some(job) => Ok(CancelOutcome::AlreadyTerminal(job.status)),
            None => Ok(CancelOutcome::NotFound),
        }
    }
}
