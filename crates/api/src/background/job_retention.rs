//! Periodic cleanup of finished jobs nobody retired.
//!
//! A progress stream normally removes a job after delivering its terminal
//! event. Jobs whose client never connected, or disconnected before the
//! end, would otherwise stay in the registry forever.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use xplain_core::registry::JobRegistry;

/// How often the sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Run the retention loop until `cancel` is triggered.
///
/// Each tick drops jobs that finished more than `retention` ago.
pub async fn run(
    registry: Arc<JobRegistry>,
    retention: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Job retention task started"
    );

    let retention = chrono::Duration::from_std(retention).ok();
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job retention task stopping");
                break;
            }
            _ = ticker.tick() => {
                // A retention too large to represent never expires anything.
                let Some(cutoff) = retention.and_then(|r| Utc::now().checked_sub_signed(r)) else {
                    continue;
                };
                let swept = registry.sweep_terminal(cutoff);
                if swept > 0 {
                    tracing::info!(swept, "Job retention: dropped unretired finished jobs");
                } else {
                    tracing::debug!("Job retention: nothing to drop");
                }
            }
        }
    }
}
