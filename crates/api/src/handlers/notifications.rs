use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/notifications/stats
///
/// Registry sizes: attached channels, subscribed jobs, subscriptions.
pub async fn hub_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = state.hub.stats().await;
    Ok(Json(DataResponse { data: stats }))
}
