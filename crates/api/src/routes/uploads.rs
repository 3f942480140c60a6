use axum::routing::get;
use axum::Router;

use crate::handlers::uploads;
use crate::state::AppState;

/// Mount artifact downloads (root level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/{filename}", get(uploads::get_upload))
}
