//! Process-wide job registry.
//!
//! The single source of truth for explanation job progress and results.
//! Every operation takes the map lock once, so each is atomic with respect
//! to a single job id. The lock is a plain `std::sync::Mutex` and is never
//! held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::job::{JobEntry, JobSnapshot, PROGRESS_COMPLETE};
use crate::types::{JobId, Timestamp};

/// Thread-safe map of job id to job state.
///
/// Designed to be wrapped in `Arc` and shared between the submission
/// path, job runners and progress streams.
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    /// Parent of every per-job cancellation token.
    shutdown: CancellationToken,
}

impl JobRegistry {
    /// Create an empty registry with its own shutdown token.
    pub fn new() -> Self {
        Self::with_shutdown(CancellationToken::new())
    }

    /// Create an empty registry whose job tokens are children of `shutdown`.
    pub fn with_shutdown(shutdown: CancellationToken) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a fresh job (`progress = 0`, no result).
    ///
    /// Returns the job's cancellation token for its runner to observe.
    pub fn create(&self, id: JobId) -> Result<CancellationToken, CoreError> {
        let mut jobs = self.lock();
        if jobs.contains_key(&id) {
            return Err(CoreError::Conflict(format!("Job {id} already exists")));
        }
        let token = self.shutdown.child_token();
        jobs.insert(id, JobEntry::new(token.clone()));
        Ok(token)
    }

    /// Current snapshot, or `None` if the job is unknown or retired.
    pub fn get(&self, id: &JobId) -> Option<JobSnapshot> {
        self.lock().get(id).map(JobEntry::snapshot)
    }

    /// Raise the job's progress to `percent`.
    ///
    /// Ignored (returns `false`) when the value would not increase
    /// progress, when it is not below 100, or when the job is already
    /// terminal or unknown.
    pub fn update_progress(&self, id: &JobId, percent: u8) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(job) if !job.is_terminal() && percent > job.progress && percent < PROGRESS_COMPLETE => {
                job.progress = percent;
                true
            }
            _ => false,
        }
    }

    /// Mark the job completed with the given artifact reference.
    ///
    /// Sets progress and result together. Returns `false` if the job is
    /// unknown or already terminal.
    pub fn complete(&self, id: &JobId, artifact: String) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(job) if !job.is_terminal() => {
                job.progress = PROGRESS_COMPLETE;
                job.result = Some(artifact);
                job.finished_at = Some(chrono::Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Mark the job failed with a human-readable message.
    ///
    /// The job becomes terminal (progress 100, no result) so that
    /// progress streams stop polling it. Returns `false` if the job is
    /// unknown or already terminal.
    pub fn fail(&self, id: &JobId, message: impl Into<String>) -> bool {
        let mut jobs = self.lock();
        match jobs.get_mut(id) {
            Some(job) if !job.is_terminal() => {
                job.progress = PROGRESS_COMPLETE;
                job.error = Some(message.into());
                job.finished_at = Some(chrono::Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Retire a job. Returns `true` only for the call that removed it.
    pub fn remove(&self, id: &JobId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Request cooperative cancellation of a running job.
    ///
    /// Returns `false` if the job is unknown or already terminal.
    pub fn cancel(&self, id: &JobId) -> bool {
        let jobs = self.lock();
        match jobs.get(id) {
            Some(job) if !job.is_terminal() => {
                job.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Cancel every running job. Used during graceful shutdown.
    pub fn cancel_all(&self) {
        self.shutdown.cancel();
    }

    /// Remove terminal jobs that finished before `cutoff`.
    ///
    /// Covers jobs whose client never opened (or never finished reading)
    /// a progress stream. Returns the number of removed entries.
    pub fn sweep_terminal(&self, cutoff: Timestamp) -> usize {
        let mut jobs = self.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !matches!(job.finished_at, Some(at) if at < cutoff));
        before - jobs.len()
    }

    /// Number of jobs currently tracked (running or awaiting retirement).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
