use axum::routing::get;
use axum::Router;

use crate::handlers::notifications;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// GET /stats   -> hub_stats
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(notifications::hub_stats))
}
