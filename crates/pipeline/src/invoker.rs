//! Stage invoker: one HTTP call per stage to a model-inference endpoint.

use crate::{Stage, StageError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Trait seam between the job executor and the external model endpoint.
///
/// Implementations include:
/// - `HttpStageInvoker` — calls a HuggingFace-style inference API
/// - test stubs that return canned text or canned failures
#[async_trait]
pub trait StageInvoker: Send + Sync {
    /// Run one named stage over the input text, returning the transformed text.
    async fn invoke(&self, stage: Stage, text: &str) -> Result<String, StageError>;
}

/// Configuration for an `HttpStageInvoker` instance.
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Base URL of the inference endpoint, e.g. `https://api-inference.huggingface.co`.
    pub base_url: String,
    /// Optional bearer token for the endpoint.
    pub api_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `max_new_tokens` generation parameter sent with every request.
    pub max_new_tokens: u32,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".into(),
            api_token: None,
            timeout: Duration::from_secs(60),
            max_new_tokens: 500,
        }
    }
}

/// Stage invoker backed by a HuggingFace-style text-generation API.
///
/// Owns its `reqwest::Client`; construct once at process start and inject
/// into the executor. No retries — a failed call is a stage failure.
pub struct HttpStageInvoker {
    client: reqwest::Client,
    config: InvokerConfig,
}

/// One element of the inference response array.
#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

impl HttpStageInvoker {
    /// Build the invoker and its HTTP client.
    pub fn new(config: InvokerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    fn model_url(&self, stage: Stage) -> String {
        format!(
            "{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            stage.model()
        )
    }
}

#[async_trait]
impl StageInvoker for HttpStageInvoker {
    async fn invoke(&self, stage: Stage, text: &str) -> Result<String, StageError> {
        let body = serde_json::json!({
            "inputs": stage.prompt(text),
            "parameters": { "max_new_tokens": self.config.max_new_tokens },
        });

        let mut request = self.client.post(self.model_url(stage)).json(&body);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| StageError::Request {
            stage: stage.as_str(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Status {
                stage: stage.as_str(),
                status,
            });
        }

        let generations: Vec<Generation> =
            response
                .json()
                .await
                .map_err(|e| StageError::InvalidResponse {
                    stage: stage.as_str(),
                    message: e.to_string(),
                })?;

        let output = generations
            .into_iter()
            .next()
            .ok_or(StageError::EmptyOutput {
                stage: stage.as_str(),
            })?
            .generated_text;

        if output.trim().is_empty() {
            return Err(StageError::EmptyOutput {
                stage: stage.as_str(),
            });
        }

        tracing::debug!(stage = %stage, output_len = output.len(), "stage invocation complete");
        Ok(output)
    }
}
