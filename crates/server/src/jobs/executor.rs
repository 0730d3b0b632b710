// crates/server/src/jobs/executor.rs
//! Background executor: drives one job's state machine to a terminal state.

use std::sync::Arc;

use docpipe_db::{Database, DbResult, JobStatus};
use docpipe_pipeline::{Stage, StageInvoker};
use tokio::sync::Semaphore;

/// Executor for background jobs.
///
/// One detached tokio task per job, fire-and-forget from the request path.
/// Concurrency is bounded by a semaphore sized to the external model
/// provider's tolerance. All job state lives in the database — every
/// checkpoint re-reads the authoritative row, never an in-memory copy.
#[derive(Clone)]
pub struct JobExecutor {
    db: Database,
    invoker: Arc<dyn StageInvoker>,
    permits: Arc<Semaphore>,
}

impl JobExecutor {
    pub fn new(db: Database, invoker: Arc<dyn StageInvoker>, max_concurrent: usize) -> Self {
        Self {
            db,
            invoker,
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Start processing a job in the background. Returns immediately.
    ///
    /// A database failure inside the task is fatal to that job's execution
    /// unit: it is logged and the job stays at its last persisted state,
    /// observable as stuck by pollers.
    pub fn spawn(&self, job_id: String) {
        let executor = self.clone();
        tokio::spawn(async move {
            if let Err(e) = executor.process(&job_id).await {
                tracing::error!(job_id = %job_id, error = %e, "job execution aborted: store failure");
            }
        });
    }

    /// Drive one job from `pending` to a terminal state.
    ///
    /// Safe to call more than once for the same id: claiming is a
    /// compare-and-swap on `pending`, so a duplicate trigger observes the
    /// lost claim and exits without side effects.
    pub(crate) async fn process(&self, job_id: &str) -> DbResult<()> {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            // Semaphore is only closed at shutdown.
            Err(_) => return Ok(()),
        };

        let Some(job) = self.db.get_job(job_id).await? else {
            tracing::warn!(job_id, "job not found, nothing to execute");
            return Ok(());
        };

        if !self.db.claim_job(job_id).await? {
            tracing::debug!(job_id, status = %job.status, "job already claimed or terminal, skipping");
            return Ok(());
        }

        tracing::info!(job_id, "job claimed, starting pipeline");

        let mut text = job
            .input_data
            .as_ref()
            .and_then(|v| v.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let total = Stage::ALL.len();
        for (idx, stage) in Stage::ALL.iter().enumerate() {
            // Cancellation checkpoint: re-read authoritative state before
            // every stage. Once cancelled, no further writes.
            match self.db.get_job(job_id).await? {
                Some(current) if current.status == JobStatus::Cancelled => {
                    tracing::info!(job_id, stage = %stage, "cancellation observed, stopping");
                    return Ok(());
                }
                Some(_) => {}
                None => return Ok(()),
            }

            match self.invoker.invoke(*stage, &text).await {
                Ok(output) => text = output,
                Err(e) => {
                    tracing::warn!(job_id, stage = %stage, error = %e, "stage failed, job failed");
                    if !self.db.fail_job(job_id, &e.to_string()).await? {
                        tracing::info!(job_id, "failure lost to concurrent cancellation");
                    }
                    return Ok(());
                }
            }

            // Coarse per-stage progress. The final 100 is written only by
            // the completed transition, atomically with the status change.
            if idx + 1 < total {
                let progress = ((idx + 1) * 100 / total) as i64;
                self.db.update_progress(job_id, progress).await?;
            }
        }

        let output = serde_json::json!({ "finalText": text });
        if self.db.complete_job(job_id, &output).await? {
            tracing::info!(job_id, "job completed");
        } else {
            tracing::info!(job_id, "job cancelled before completion could be recorded");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubInvoker;
    use async_trait::async_trait;
    use docpipe_db::CancelOutcome;
    use docpipe_pipeline::StageError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    async fn test_db() -> Database {
        Database::new_in_memory().await.expect("in-memory DB")
    }

    fn executor_with(db: &Database, invoker: Arc<dyn StageInvoker>) -> JobExecutor {
        JobExecutor::new(db.clone(), invoker, 4)
    }

    #[tokio::test]
    async fn test_full_pipeline_completes() {
        // Scenario: identity stages, input {"text": "hello"}.
        let db = test_db().await;
        let stub = Arc::new(StubInvoker::identity());
        let executor = executor_with(&db, stub.clone());

        let input = json!({"text": "hello"});
        let job = db.insert_job("agent-1", "user-1", Some(&input)).await.unwrap();
        executor.process(&job.id).await.unwrap();

        let done = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.output_data, Some(json!({"finalText": "hello"})));
        assert_eq!(stub.calls(), Stage::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_missing_text_falls_back_to_empty() {
        let db = test_db().await;
        let stub = Arc::new(StubInvoker::identity());
        let executor = executor_with(&db, stub.clone());

        let input = json!({"text": 42});
        let job = db.insert_job("a", "u", Some(&input)).await.unwrap();
        executor.process(&job.id).await.unwrap();

        let done = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.output_data, Some(json!({"finalText": ""})));
    }

    #[tokio::test]
    async fn test_stage_failure_stops_pipeline() {
        // Scenario: citation fails; formatting and compliance never run.
        let db = test_db().await;
        let stub = Arc::new(StubInvoker::failing_at(Stage::Citation));
        let executor = executor_with(&db, stub.clone());

        let job = db
            .insert_job("a", "u", Some(&json!({"text": "hi"})))
            .await
            .unwrap();
        executor.process(&job.id).await.unwrap();

        let done = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        let error_message = done.output_data.unwrap()["error"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(error_message.contains("citation"), "{error_message}");
        assert_eq!(
            stub.calls(),
            vec![Stage::Ingestion, Stage::Research, Stage::Citation]
        );
    }

    #[tokio::test]
    async fn test_cancel_before_start_invokes_nothing() {
        // Scenario: cancellation lands before the executor's first read.
        let db = test_db().await;
        let stub = Arc::new(StubInvoker::identity());
        let executor = executor_with(&db, stub.clone());

        let job = db
            .insert_job("a", "u", Some(&json!({"text": "hi"})))
            .await
            .unwrap();
        assert_eq!(db.cancel_job(&job.id).await.unwrap(), CancelOutcome::Cancelled);

        executor.process(&job.id).await.unwrap();

        let done = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Cancelled);
        assert!(stub.calls().is_empty(), "no stage may run after cancel");
    }

    /// Invoker that cancels its own job from inside a chosen stage,
    /// simulating a cancel request racing the pipeline mid-flight.
    struct CancellingInvoker {
        db: Database,
        job_id: Mutex<String>,
        cancel_during: Stage,
        calls: Mutex<Vec<Stage>>,
    }

    #[async_trait]
    impl StageInvoker for CancellingInvoker {
        async fn invoke(&self, stage: Stage, text: &str) -> Result<String, StageError> {
            self.calls.lock().unwrap().push(stage);
            if stage == self.cancel_during {
                let id = self.job_id.lock().unwrap().clone();
                self.db.cancel_job(&id).await.expect("cancel");
            }
            Ok(text.to_string())
        }
    }

    #[tokio::test]
    async fn test_cancel_between_stages_runs_prefix_only() {
        let db = test_db().await;
        let invoker = Arc::new(CancellingInvoker {
            db: db.clone(),
            job_id: Mutex::new(String::new()),
            cancel_during: Stage::Research,
            calls: Mutex::new(Vec::new()),
        });
        let executor = executor_with(&db, invoker.clone());

        let job = db
            .insert_job("a", "u", Some(&json!({"text": "hi"})))
            .await
            .unwrap();
        *invoker.job_id.lock().unwrap() = job.id.clone();

        executor.process(&job.id).await.unwrap();

        let done = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Cancelled);
        // Stages 1..K ran exactly once each; nothing beyond K.
        assert_eq!(
            *invoker.calls.lock().unwrap(),
            vec![Stage::Ingestion, Stage::Research]
        );
        // No completion output was backfilled.
        assert_eq!(done.output_data, None);
    }

    #[tokio::test]
    async fn test_duplicate_trigger_runs_once() {
        let db = test_db().await;
        let stub = Arc::new(StubInvoker::identity());
        let executor = executor_with(&db, stub.clone());

        let job = db
            .insert_job("a", "u", Some(&json!({"text": "hi"})))
            .await
            .unwrap();

        executor.process(&job.id).await.unwrap();
        // Second trigger must observe non-pending status and exit silently.
        executor.process(&job.id).await.unwrap();

        assert_eq!(stub.calls().len(), Stage::ALL.len());
        let done = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_triggers_single_claim() {
        let db = test_db().await;
        let stub = Arc::new(StubInvoker::identity().with_delay(Duration::from_millis(10)));
        let executor = executor_with(&db, stub.clone());

        let job = db
            .insert_job("a", "u", Some(&json!({"text": "hi"})))
            .await
            .unwrap();

        let (a, b) = tokio::join!(executor.process(&job.id), executor.process(&job.id));
        a.unwrap();
        b.unwrap();

        assert_eq!(stub.calls().len(), Stage::ALL.len(), "exactly one full run");
        let done = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_missing_job_is_a_silent_noop() {
        let db = test_db().await;
        let stub = Arc::new(StubInvoker::identity());
        let executor = executor_with(&db, stub.clone());

        executor.process("no-such-job").await.unwrap();
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_is_fire_and_forget() {
        let db = test_db().await;
        let stub = Arc::new(StubInvoker::identity());
        let executor = executor_with(&db, stub.clone());

        let job = db
            .insert_job("a", "u", Some(&json!({"text": "bg"})))
            .await
            .unwrap();
        executor.spawn(job.id.clone());

        // Poll until the detached task finishes.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let current = db.get_job(&job.id).await.unwrap().unwrap();
            if current.status.is_terminal() {
                assert_eq!(current.status, JobStatus::Completed);
                assert_eq!(current.output_data, Some(json!({"finalText": "bg"})));
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "job did not finish in time (status {})",
                current.status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_progress_is_monotone_per_stage() {
        // Observe progress after each stage via an invoker that snapshots it.
        struct SnapshottingInvoker {
            db: Database,
            job_id: Mutex<String>,
            seen: Mutex<Vec<i64>>,
        }

        #[async_trait]
        impl StageInvoker for SnapshottingInvoker {
            async fn invoke(&self, _stage: Stage, text: &str) -> Result<String, StageError> {
                let id = self.job_id.lock().unwrap().clone();
                let job = self.db.get_job(&id).await.expect("get").expect("exists");
                self.seen.lock().unwrap().push(job.progress);
                Ok(text.to_string())
            }
        }

        let db = test_db().await;
        let invoker = Arc::new(SnapshottingInvoker {
            db: db.clone(),
            job_id: Mutex::new(String::new()),
            seen: Mutex::new(Vec::new()),
        });
        let executor = executor_with(&db, invoker.clone());

        let job = db
            .insert_job("a", "u", Some(&json!({"text": "hi"})))
            .await
            .unwrap();
        *invoker.job_id.lock().unwrap() = job.id.clone();
        executor.process(&job.id).await.unwrap();

        // Progress observed at the start of each stage: 0, 20, 40, 60, 80.
        assert_eq!(*invoker.seen.lock().unwrap(), vec![0, 20, 40, 60, 80]);
        let done = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(done.progress, 100);
    }
}
