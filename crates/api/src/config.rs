use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use xplain_core::capability::ExplainParams;
use xplain_core::job::DEFAULT_PROGRESS_GRANULARITY;
use xplain_pipeline::RunnerConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// Time allowed to produce response headers, in seconds (default: `30`).
    /// Streaming bodies are not bounded by it.
    pub request_timeout_secs: u64,
    /// Maximum accepted request body size (default: 10 MiB).
    pub max_upload_bytes: usize,
    /// Directory for transient job input files (default: `uploads`).
    pub upload_dir: PathBuf,
    /// Directory for artifacts when no database is configured (default: `artifacts`).
    pub artifact_dir: PathBuf,
    /// Model server predict endpoint.
    pub model_url: String,
    /// CSV file holding the label set (default: `breeds.csv`).
    pub labels_path: PathBuf,
    /// Perturbed samples scored per explanation (default: `1000`).
    pub explain_num_samples: usize,
    /// Samples per classifier call (default: `10`).
    pub explain_batch_size: usize,
    /// Regions kept in the explanation mask (default: `5`).
    pub explain_num_features: usize,
    /// Samples per reported percentage point (default: `10`).
    pub progress_granularity: usize,
    /// Delay between registry reads in a progress stream (default: `500` ms).
    pub progress_poll_interval_ms: u64,
    /// How long an unretired finished job stays in the registry (default: `600` s).
    pub job_retention_secs: u64,
    /// Optional PostgreSQL URL. When set, artifacts are stored in the
    /// `uploads` table instead of `artifact_dir`.
    pub database_url: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                                         |
    /// |-----------------------------|-------------------------------------------------|
    /// | `HOST`                      | `0.0.0.0`                                       |
    /// | `PORT`                      | `5000`                                          |
    /// | `CORS_ORIGINS`              | `http://localhost:3000`                         |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                                            |
    /// | `MAX_UPLOAD_BYTES`          | `10485760`                                      |
    /// | `UPLOAD_DIR`                | `uploads`                                       |
    /// | `ARTIFACT_DIR`              | `artifacts`                                     |
    /// | `MODEL_URL`                 | `http://localhost:8501/v1/models/breeds:predict`|
    /// | `LABELS_PATH`               | `breeds.csv`                                    |
    /// | `EXPLAIN_NUM_SAMPLES`       | `1000`                                          |
    /// | `EXPLAIN_BATCH_SIZE`        | `10`                                            |
    /// | `EXPLAIN_NUM_FEATURES`      | `5`                                             |
    /// | `PROGRESS_GRANULARITY`      | `10`                                            |
    /// | `PROGRESS_POLL_INTERVAL_MS` | `500`                                           |
    /// | `JOB_RETENTION_SECS`        | `600`                                           |
    /// | `DATABASE_URL`              | unset                                           |
    pub fn from_env() -> Self {
        let defaults = ExplainParams::default();

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_env("PORT", 5000),
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".into())
                .into(),
            artifact_dir: std::env::var("ARTIFACT_DIR")
                .unwrap_or_else(|_| "artifacts".into())
                .into(),
            model_url: std::env::var("MODEL_URL")
                .unwrap_or_else(|_| "http://localhost:8501/v1/models/breeds:predict".into()),
            labels_path: std::env::var("LABELS_PATH")
                .unwrap_or_else(|_| "breeds.csv".into())
                .into(),
            explain_num_samples: parse_env("EXPLAIN_NUM_SAMPLES", defaults.num_samples),
            explain_batch_size: parse_env("EXPLAIN_BATCH_SIZE", defaults.batch_size),
            explain_num_features: parse_env("EXPLAIN_NUM_FEATURES", defaults.num_features),
            progress_granularity: parse_env("PROGRESS_GRANULARITY", DEFAULT_PROGRESS_GRANULARITY),
            progress_poll_interval_ms: parse_env("PROGRESS_POLL_INTERVAL_MS", 500),
            job_retention_secs: parse_env("JOB_RETENTION_SECS", 600),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
        }
    }

    /// Tuning handed to the job runner.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            params: ExplainParams {
                num_samples: self.explain_num_samples,
                batch_size: self.explain_batch_size,
                num_features: self.explain_num_features,
            },
            progress_granularity: self.progress_granularity,
        }
    }

    pub fn progress_poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_interval_ms)
    }

    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }
}

/// Read `key` and parse it, falling back to `default` when unset.
///
/// Panics on an unparseable value: misconfiguration should fail at startup.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
