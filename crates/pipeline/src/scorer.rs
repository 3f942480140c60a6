//! Progress-reporting scoring callback.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use xplain_core::capability::{Classifier, Scorer, Scores};
use xplain_core::error::CoreError;
use xplain_core::image::ImageTensor;
use xplain_core::job::sampling_progress;
use xplain_core::registry::JobRegistry;
use xplain_core::types::JobId;

/// Wraps a [`Classifier`] for one job.
///
/// Counts every scored sample and pushes `samples / granularity` (capped
/// below 100) into the registry whenever it moves up. Checks the job's
/// cancellation token before and during each batch.
pub struct ProgressScorer {
    classifier: Arc<dyn Classifier>,
    registry: Arc<JobRegistry>,
    job_id: JobId,
    cancel: CancellationToken,
    granularity: usize,
    samples: usize,
    reported: u8,
}

impl ProgressScorer {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        registry: Arc<JobRegistry>,
        job_id: JobId,
        cancel: CancellationToken,
        granularity: usize,
    ) -> Self {
        Self {
            classifier,
            registry,
            job_id,
            cancel,
            granularity,
            samples: 0,
            reported: 0,
        }
    }

    /// Cumulative number of samples scored so far.
    pub fn samples(&self) -> usize {
        self.samples
    }
}

#[async_trait]
impl Scorer for ProgressScorer {
    async fn score(&mut self, batch: &[ImageTensor]) -> Result<Vec<Scores>, CoreError> {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let scores = tokio::select! {
            _ = self.cancel.cancelled() => return Err(CoreError::Cancelled),
            result = self.classifier.predict(batch) => result?,
        };

        if scores.len() != batch.len() {
            return Err(CoreError::Inference(format!(
                "Classifier returned {} results for a batch of {}",
                scores.len(),
                batch.len()
            )));
        }

        self.samples += batch.len();
        let percent = sampling_progress(self.samples, self.granularity);
        if percent > self.reported {
            self.reported = percent;
            self.registry.update_progress(&self.job_id, percent);
            tracing::trace!(job_id = %self.job_id, samples = self.samples, percent, "Progress");
        }

        Ok(scores)
    }
}
