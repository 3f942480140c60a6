//! Handlers for explanation jobs.
//!
//! Submission stores the upload, registers the job and hands it to the
//! runner without waiting for it. Progress is observed through the SSE
//! stream, which retires the job once it has delivered the terminal event.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Serialize;
use xplain_core::error::CoreError;
use xplain_core::image::detect_format;
use xplain_core::job::JobSnapshot;
use xplain_core::types::JobId;

use crate::engine::progress::progress_stream;
use crate::error::{AppError, AppResult};
use crate::handlers::multipart::read_file_field;
use crate::response::DataResponse;
use crate::state::AppState;

/// Response body for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
}

/// POST /api/v1/explain
///
/// Accepts a multipart form with a required `file` field holding the image.
/// Returns the new job's id immediately; the explanation runs in the
/// background.
pub async fn submit_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SubmitResponse>>)> {
    let bytes = read_file_field(&mut multipart).await?;
    let format = detect_format(&bytes)?;
    let ext = format.extensions_str().first().copied().unwrap_or("img");

    let upload_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload directory: {e}")))?;

    let job_id = JobId::new();
    let cancel = state.registry.create(job_id)?;

    let input = upload_dir.join(format!("{job_id}.{ext}"));
    if let Err(e) = tokio::fs::write(&input, &bytes).await {
        state.registry.remove(&job_id);
        return Err(AppError::InternalError(format!(
            "Failed to store upload for job {job_id}: {e}"
        )));
    }

    // Detached: the handle is dropped and the job reports through the registry.
    state.runner.spawn(job_id, input, cancel);

    tracing::info!(%job_id, bytes = bytes.len(), format = ?format, "Explanation job submitted");

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmitResponse { job_id },
        }),
    ))
}

/// GET /api/v1/explain/{job_id}/progress
///
/// Server-sent events, one `data: {"progress": N, "result": ...}` line per
/// poll. Unknown or malformed ids get an empty stream.
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let job_id = job_id.parse::<JobId>().ok();
    let events = progress_stream(
        Arc::clone(&state.registry),
        job_id,
        state.config.progress_poll_interval(),
    )
    .map(|snapshot| Event::default().json_data(snapshot));

    Sse::new(events)
}

/// GET /api/v1/explain/{job_id}
///
/// One-shot snapshot. Unlike the stream, reading a finished job here does
/// not retire it.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let id = parse_known(&job_id)?;
    let snapshot = state.registry.get(&id).ok_or_else(|| job_not_found(&job_id))?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// POST /api/v1/explain/{job_id}/cancel
///
/// Requests cooperative cancellation. The job ends as failed with the
/// error `"cancelled"` once its runner notices.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_known(&job_id)?;
    let snapshot = state.registry.get(&id).ok_or_else(|| job_not_found(&job_id))?;

    if snapshot.is_terminal() || !state.registry.cancel(&id) {
        return Err(CoreError::Conflict(format!("Job {id} has already finished")).into());
    }

    tracing::info!(job_id = %id, "Job cancellation requested");
    Ok(StatusCode::NO_CONTENT)
}

/// Parse a path id, reporting malformed ids as unknown jobs.
fn parse_known(raw: &str) -> Result<JobId, CoreError> {
    raw.parse().map_err(|_| job_not_found(raw))
}

fn job_not_found(raw: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: raw.to_string(),
    }
}
