//! Background execution of explanation jobs.
//!
//! One [`JobRunner`] is shared by the whole process; [`JobRunner::spawn`]
//! starts a detached Tokio task per job. The task talks to the outside
//! world only through the [`JobRegistry`]: progress while sampling, then
//! exactly one of `complete` or `fail`. A panic anywhere in the job is
//! caught and recorded as a failure so progress streams always reach a
//! terminal state.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use xplain_core::capability::{Classifier, ExplainParams, Explainer};
use xplain_core::error::CoreError;
use xplain_core::image::{decode_normalized, encode_jpeg, overlay_boundaries};
use xplain_core::job::{CANCELLED_MESSAGE, DEFAULT_PROGRESS_GRANULARITY};
use xplain_core::registry::JobRegistry;
use xplain_core::storage::ArtifactStore;
use xplain_core::types::JobId;

use crate::scorer::ProgressScorer;

/// Message recorded when a job task panics.
const PANIC_MESSAGE: &str = "internal error";

/// Tuning for every job the runner executes.
#[derive(Debug, Clone, Copy)]
pub struct RunnerConfig {
    pub params: ExplainParams,
    /// Scored samples per reported percentage point.
    pub progress_granularity: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            params: ExplainParams::default(),
            progress_granularity: DEFAULT_PROGRESS_GRANULARITY,
        }
    }
}

/// Reference under which a job's artifact is stored.
pub fn artifact_filename(job_id: JobId) -> String {
    format!("{job_id}_explained.jpg")
}

/// Executes explanation jobs against the configured capabilities.
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    classifier: Arc<dyn Classifier>,
    explainer: Arc<dyn Explainer>,
    store: Arc<dyn ArtifactStore>,
    config: RunnerConfig,
}

impl JobRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        classifier: Arc<dyn Classifier>,
        explainer: Arc<dyn Explainer>,
        store: Arc<dyn ArtifactStore>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            registry,
            classifier,
            explainer,
            store,
            config,
        }
    }

    /// Start the job in the background and return immediately.
    ///
    /// The job must already exist in the registry; `cancel` is the token
    /// returned by [`JobRegistry::create`]. The returned handle may be
    /// dropped, which detaches the task.
    pub fn spawn(self: &Arc<Self>, job_id: JobId, input: PathBuf, cancel: CancellationToken) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = AssertUnwindSafe(runner.run(job_id, &input, cancel))
                .catch_unwind()
                .await;

            if outcome.is_err() {
                tracing::error!(job_id = %job_id, "Explanation job panicked");
                runner.registry.fail(&job_id, PANIC_MESSAGE);
                remove_input(job_id, &input).await;
            }
        })
    }

    /// Run the job to a terminal state. Never returns an error: every
    /// failure is recorded in the registry instead.
    pub async fn run(&self, job_id: JobId, input: &Path, cancel: CancellationToken) {
        let started = Instant::now();
        tracing::info!(job_id = %job_id, input = %input.display(), "Explanation job started");

        match self.execute(job_id, input, cancel).await {
            Ok(artifact) => {
                if self.registry.complete(&job_id, artifact.clone()) {
                    tracing::info!(
                        job_id = %job_id,
                        artifact = %artifact,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Explanation job completed",
                    );
                } else {
                    tracing::warn!(job_id = %job_id, "Job left the registry before completion");
                }
            }
            Err(CoreError::Cancelled) => {
                tracing::info!(job_id = %job_id, "Explanation job cancelled");
                self.registry.fail(&job_id, CANCELLED_MESSAGE);
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Explanation job failed");
                self.registry.fail(&job_id, e.to_string());
            }
        }

        remove_input(job_id, input).await;
    }

    async fn execute(&self, job_id: JobId, input: &Path, cancel: CancellationToken) -> Result<String, CoreError> {
        let bytes = tokio::fs::read(input)
            .await
            .map_err(|e| CoreError::Internal(format!("Failed to read job input {}: {e}", input.display())))?;

        let tensor = blocking(move || decode_normalized(&bytes)).await?;

        let mut scorer = ProgressScorer::new(
            Arc::clone(&self.classifier),
            Arc::clone(&self.registry),
            job_id,
            cancel.clone(),
            self.config.progress_granularity,
        );
        let explanation = self
            .explainer
            .explain(&tensor, &mut scorer, &self.config.params)
            .await?;
        tracing::debug!(
            job_id = %job_id,
            label = explanation.label,
            samples = scorer.samples(),
            highlighted_px = explanation.mask.count(),
            "Explanation computed",
        );

        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let artifact = blocking(move || {
            let overlay = overlay_boundaries(&tensor, &explanation.mask)?;
            encode_jpeg(&overlay)
        })
        .await?;

        self.store.persist(&artifact_filename(job_id), artifact).await
    }
}

/// Run CPU-bound image work off the async worker threads.
async fn blocking<T, F>(f: F) -> Result<T, CoreError>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Internal(format!("Image task failed: {e}")))?
}

/// Best-effort removal of the transient input file.
async fn remove_input(job_id: JobId, input: &Path) {
    match tokio::fs::remove_file(input).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(job_id = %job_id, path = %input.display(), error = %e, "Failed to remove job input");
        }
    }
}
