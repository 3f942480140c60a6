pub mod explain;
pub mod health;
pub mod predict;
pub mod uploads;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /explain                                         submit job (POST, multipart)
/// /explain/{job_id}                                snapshot (GET)
/// /explain/{job_id}/progress                       progress stream (GET, SSE)
/// /explain/{job_id}/cancel                         cancel (POST)
///
/// /predict                                         classify (POST, multipart)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(explain::router())
        .merge(predict::router())
}
