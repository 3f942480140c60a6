use axum::extract::{Multipart, State};
use axum::Json;
use xplain_core::image::detect_format;
use xplain_pipeline::predict::{classify, Prediction};

use crate::error::AppResult;
use crate::handlers::multipart::read_file_field;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/predict
///
/// Classifies the uploaded image synchronously and returns the top label
/// with the five best-scoring labels as `analysis`.
pub async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<Prediction>>> {
    let bytes = read_file_field(&mut multipart).await?;
    detect_format(&bytes)?;

    let prediction = classify(state.classifier.as_ref(), &state.labels, bytes.to_vec()).await?;

    tracing::info!(
        breed = %prediction.breed,
        confidence = prediction.confidence,
        "Prediction served"
    );

    Ok(Json(DataResponse { data: prediction }))
}
