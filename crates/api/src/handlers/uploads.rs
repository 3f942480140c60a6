use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use xplain_core::error::CoreError;
use xplain_core::image::detect_format;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /uploads/{filename}
///
/// Serves a stored artifact with a content type sniffed from its bytes.
pub async fn get_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    let bytes = state
        .store
        .load(&filename)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Upload",
            id: filename.clone(),
        })?;

    let content_type = detect_format(&bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok(([(CONTENT_TYPE, content_type)], bytes).into_response())
}
