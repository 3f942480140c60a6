//! Seams to the external model capabilities.
//!
//! The pipeline never knows how a model scores an image or how an
//! explanation is derived; it only drives these traits. Production
//! implementations live in `xplain-pipeline`, tests supply fakes.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::image::{ImageTensor, PixelMask};

/// Per-class scores for one image, indexed like the label set.
pub type Scores = Vec<f32>;

/// Inference capability: scores a batch of normalized images.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Return one score vector per input image, in input order.
    async fn predict(&self, batch: &[ImageTensor]) -> Result<Vec<Scores>, CoreError>;
}

/// Scoring callback handed to an [`Explainer`].
///
/// Each call is one batch of perturbed samples. Implementations may
/// observe the cumulative sample count (for progress reporting) and may
/// refuse further work by returning [`CoreError::Cancelled`].
#[async_trait]
pub trait Scorer: Send {
    async fn score(&mut self, batch: &[ImageTensor]) -> Result<Vec<Scores>, CoreError>;
}

/// Tuning knobs for one explanation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExplainParams {
    /// Total number of perturbed samples to score.
    pub num_samples: usize,
    /// Samples scored per [`Scorer::score`] call.
    pub batch_size: usize,
    /// Number of most influential regions kept in the mask.
    pub num_features: usize,
}

impl Default for ExplainParams {
    fn default() -> Self {
        Self {
            num_samples: 1000,
            batch_size: 10,
            num_features: 5,
        }
    }
}

/// Output of an explanation run.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Index of the label that was explained (the model's top label).
    pub label: usize,
    /// Pixels belonging to regions that pushed the score of `label` up.
    pub mask: PixelMask,
}

/// Explanation capability: finds the regions that drove a prediction.
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(
        &self,
        image: &ImageTensor,
        scorer: &mut dyn Scorer,
        params: &ExplainParams,
    ) -> Result<Explanation, CoreError>;
}
