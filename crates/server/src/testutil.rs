// crates/server/src/testutil.rs
//! Shared test helpers (compiled only for tests).

use async_trait::async_trait;
use docpipe_pipeline::{Stage, StageError, StageInvoker};
use std::sync::Mutex;
use std::time::Duration;

/// Stage invoker stub: echoes its input, optionally failing at one stage
/// or sleeping before each call. Records every invocation in order.
pub(crate) struct StubInvoker {
    fail_at: Option<Stage>,
    delay: Option<Duration>,
    calls: Mutex<Vec<Stage>>,
}

impl StubInvoker {
    /// Every stage returns its input unchanged.
    pub fn identity() -> Self {
        Self {
            fail_at: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Like `identity`, but the given stage fails.
    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::identity()
        }
    }

    /// Sleep before each invocation (to widen race windows in tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Stages invoked so far, in order.
    pub fn calls(&self) -> Vec<Stage> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageInvoker for StubInvoker {
    async fn invoke(&self, stage: Stage, text: &str) -> Result<String, StageError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(stage);
        if self.fail_at == Some(stage) {
            return Err(StageError::EmptyOutput {
                stage: stage.as_str(),
            });
        }
        Ok(text.to_string())
    }
}
