//! Synchronous single-image classification.

use serde::Serialize;
use xplain_core::capability::Classifier;
use xplain_core::error::CoreError;
use xplain_core::image::decode_normalized;
use xplain_core::labels::{LabelSet, RankedLabel, TOP_K};

/// Top label plus the ranked analysis list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub breed: String,
    pub confidence: f64,
    pub analysis: Vec<RankedLabel>,
}

/// Decode `bytes`, score them once and rank the result against `labels`.
pub async fn classify(
    classifier: &dyn Classifier,
    labels: &LabelSet,
    bytes: Vec<u8>,
) -> Result<Prediction, CoreError> {
    let tensor = tokio::task::spawn_blocking(move || decode_normalized(&bytes))
        .await
        .map_err(|e| CoreError::Internal(format!("Image decode task failed: {e}")))??;

    let scores = classifier
        .predict(std::slice::from_ref(&tensor))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::Inference("Classifier returned no prediction".into()))?;

    let analysis = labels.top_k(&scores, TOP_K)?;
    let top = analysis
        .first()
        .cloned()
        .ok_or_else(|| CoreError::Inference("Label set is empty".into()))?;

    Ok(Prediction {
        breed: top.breed,
        confidence: top.confidence,
        analysis,
    })
}
