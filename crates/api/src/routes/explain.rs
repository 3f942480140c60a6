use axum::routing::{get, post};
use axum::Router;

use crate::handlers::explain;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/explain", post(explain::submit_job))
        .route("/explain/{job_id}", get(explain::get_job))
        .route("/explain/{job_id}/progress", get(explain::stream_progress))
        .route("/explain/{job_id}/cancel", post(explain::cancel_job))
}
