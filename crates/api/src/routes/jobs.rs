//! Route definitions for the `/jobs` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                   -> list_jobs
/// POST   /                   -> create_job
/// GET    /{id}               -> get_job
/// DELETE /{id}               -> delete_job
/// POST   /{id}/transitions   -> report_transition
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/{id}/transitions", post(jobs::report_transition))
}
