//! Progress streaming for explanation jobs.
//!
//! A progress stream reads the job's snapshot from the registry, yields it,
//! sleeps for the poll interval and repeats. The terminal snapshot is
//! yielded exactly once. The stream then waits [`RETIRE_GRACE_POLLS`] poll
//! intervals before retiring the job, so every other reader polling on the
//! same interval also reads the terminal snapshot. A job that is not in the
//! registry ends the stream without yielding anything.
//!
//! Streams never touch the runner. Dropping one (client disconnect) leaves
//! the job running and its entry in place.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use xplain_core::job::JobSnapshot;
use xplain_core::registry::JobRegistry;
use xplain_core::types::JobId;

/// Delay between registry reads when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Poll intervals a stream waits after the terminal event before retiring
/// the job. One interval lets every concurrent reader take one more read;
/// the second absorbs timer jitter between readers.
pub const RETIRE_GRACE_POLLS: u32 = 2;

enum Phase {
    First,
    Polling,
    Retire,
}

/// Stream of snapshots for `job_id` until it reaches a terminal state.
///
/// `None` stands for an id that could not be parsed and behaves exactly
/// like an unknown job.
pub fn progress_stream(
    registry: Arc<JobRegistry>,
    job_id: Option<JobId>,
    poll_interval: Duration,
) -> impl Stream<Item = JobSnapshot> + Send + 'static {
    stream::unfold(Phase::First, move |phase| {
        let registry = Arc::clone(&registry);
        async move {
            let job_id = job_id?;

            match phase {
                Phase::First => {}
                Phase::Polling => tokio::time::sleep(poll_interval).await,
                Phase::Retire => {
                    tokio::time::sleep(poll_interval * RETIRE_GRACE_POLLS).await;
                    if registry.remove(&job_id) {
                        tracing::info!(%job_id, "Job retired after terminal event");
                    } else {
                        tracing::debug!(%job_id, "Job already retired by another stream");
                    }
                    return None;
                }
            }

            let Some(snapshot) = registry.get(&job_id) else {
                tracing::debug!(%job_id, "Job not found, closing progress stream");
                return None;
            };

            let next = if snapshot.is_terminal() {
                Phase::Retire
            } else {
                Phase::Polling
            };
            Some((snapshot, next))
        }
    })
}
