//! Handlers for the `/jobs` resource.
//!
//! `GET /jobs/{id}` doubles as the polling fallback for clients that lost
//! their socket and need the current state after reconnecting.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mediscan_core::types::JobId;
use mediscan_core::{CoreError, Job, JobUpdate, NewJob, Notification};
use mediscan_db::JobListQuery;

use crate::engine::transitions;
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_job(state: &AppState, job_id: &str) -> AppResult<Job> {
    state
        .jobs
        .find_by_id(job_id)
        .await
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Job",
                id: job_id.to_string(),
            })
        })
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a job in `PENDING` status. Returns 201 with the created job and
/// broadcasts `job_created` to every attached channel.
pub async fn create_job(
    State(state): State<AppState>,
    Json(input): Json<NewJob>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.create(input).await?;

    let delivered = state.hub.broadcast(&Notification::job_created(&job)).await;
    tracing::info!(
        job_id = %job.id,
        image_id = %job.image_id,
        model_id = %job.model_id,
        delivered,
        "Job created",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Supports optional `status`, `requested_by`, `limit`, and `offset` query
/// parameters. Newest jobs first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.jobs.list(&params).await;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state, &job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/transitions
///
/// Report a status change. The transition is validated and committed, then
/// pushed to the job's subscribers. Returns the committed record.
pub async fn report_transition(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(update): Json<JobUpdate>,
) -> AppResult<impl IntoResponse> {
    let job = transitions::apply(&state.jobs, &state.hub, &job_id, &update).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/jobs/{id}
///
/// An active job is cancelled first so its subscribers receive a final
/// update. The record is then removed and `job_deleted` is broadcast.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<StatusCode> {
    let job = find_job(&state, &job_id).await?;
    let job = transitions::cancel_for_deletion(&state.jobs, &state.hub, &job).await?;

    if state.jobs.delete(&job_id).await.is_none() {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id,
        }));
    }

    let delivered = state.hub.broadcast(&Notification::job_deleted(&job)).await;
    tracing::info!(job_id = %job.id, delivered, "Job deleted");

    Ok(StatusCode::NO_CONTENT)
}
