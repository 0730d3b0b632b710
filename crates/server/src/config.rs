// crates/server/src/config.rs
//! Environment-based server configuration.

use docpipe_pipeline::InvokerConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Default port for the server.
const DEFAULT_PORT: u16 = 47310;

/// Default bound on concurrently executing jobs.
const DEFAULT_MAX_JOBS: usize = 8;

/// Server configuration assembled from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port (`DOCPIPE_PORT`, then `PORT`).
    pub port: u16,
    /// Database file path (`DOCPIPE_DB`); default location when unset.
    pub db_path: Option<PathBuf>,
    /// Bound on concurrently executing jobs (`DOCPIPE_MAX_JOBS`).
    pub max_concurrent_jobs: usize,
    /// Stage invoker settings (`DOCPIPE_INFERENCE_URL`, `HF_TOKEN`,
    /// `DOCPIPE_STAGE_TIMEOUT_SECS`, `DOCPIPE_MAX_NEW_TOKENS`).
    pub invoker: InvokerConfig,
}

impl Config {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = InvokerConfig::default();

        let port = get("DOCPIPE_PORT")
            .or_else(|| get("PORT"))
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let db_path = get("DOCPIPE_DB").map(PathBuf::from);

        let max_concurrent_jobs = get("DOCPIPE_MAX_JOBS")
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_MAX_JOBS);

        let invoker = InvokerConfig {
            base_url: get("DOCPIPE_INFERENCE_URL").unwrap_or(defaults.base_url),
            api_token: get("HF_TOKEN"),
            timeout: get("DOCPIPE_STAGE_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_new_tokens: get("DOCPIPE_MAX_NEW_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_new_tokens),
        };

        Self {
            port,
            db_path,
            max_concurrent_jobs,
            invoker,
        }
    }
}
