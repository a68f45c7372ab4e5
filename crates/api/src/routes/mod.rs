pub mod announcements;
pub mod health;
pub mod jobs;
pub mod notifications;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  WebSocket (server-assigned client id)
/// /ws/{client_id}?job_id=              WebSocket (client-chosen id, optional
///                                      immediate subscription)
///
/// /jobs                                list, create
/// /jobs/{id}                           get, delete
/// /jobs/{id}/transitions               report a status change (POST)
///
/// /announcements                       system-wide broadcast (POST)
///
/// /notifications/stats                 hub statistics (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoints.
        .route("/ws", get(ws::ws_handler))
        .route("/ws/{client_id}", get(ws::ws_handler_with_id))
        .nest("/jobs", jobs::router())
        .nest("/announcements", announcements::router())
        .nest("/notifications", notifications::router())
}
