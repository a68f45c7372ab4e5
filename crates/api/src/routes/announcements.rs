use axum::routing::post;
use axum::Router;

use crate::handlers::announcements;
use crate::state::AppState;

/// Routes mounted at `/announcements`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", post(announcements::announce))
}
