//! Explanation job state and progress arithmetic.
//!
//! A job is *terminal* once its progress reaches [`PROGRESS_COMPLETE`] and
//! exactly one of `result` / `error` is present. Only terminal jobs are
//! retired from the registry.

use serde::Serialize;

use crate::types::Timestamp;

/// Progress value of a terminal job.
pub const PROGRESS_COMPLETE: u8 = 100;

/// Highest value the sampling signal may report. 100 is reserved for
/// `complete` / `fail` so that a snapshot at 100 is always terminal.
pub const SAMPLING_PROGRESS_CAP: u8 = 99;

/// Default number of scored samples per reported percentage point.
pub const DEFAULT_PROGRESS_GRANULARITY: usize = 10;

/// Error message recorded when a job is cancelled before completion.
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Point-in-time view of a job, also used verbatim as the progress
/// event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    /// Integer percentage, 0-100.
    pub progress: u8,
    /// Artifact reference, present once the job completed successfully.
    pub result: Option<String>,
    /// Failure message, present once the job failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobSnapshot {
    /// Whether this snapshot is the last one a stream will ever see.
    pub fn is_terminal(&self) -> bool {
        self.progress >= PROGRESS_COMPLETE && (self.result.is_some() || self.error.is_some())
    }
}

/// Registry-internal job record.
#[derive(Debug)]
pub(crate) struct JobEntry {
    pub progress: u8,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub cancel: tokio_util::sync::CancellationToken,
}

impl JobEntry {
    pub fn new(cancel: tokio_util::sync::CancellationToken) -> Self {
        Self {
            progress: 0,
            result: None,
            error: None,
            created_at: chrono::Utc::now(),
            finished_at: None,
            cancel,
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            progress: self.progress,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.finished_at.is_some()
    }
}

/// Map a cumulative sample count onto a progress percentage.
///
/// `granularity` samples make one percentage point; the result never
/// exceeds [`SAMPLING_PROGRESS_CAP`]. A zero granularity is treated as 1.
pub fn sampling_progress(cumulative_samples: usize, granularity: usize) -> u8 {
    let points = cumulative_samples / granularity.max(1);
    points.min(SAMPLING_PROGRESS_CAP as usize) as u8
}
