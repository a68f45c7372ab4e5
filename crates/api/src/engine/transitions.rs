//! Committed-transition reporting.
//!
//! The store validates and commits first; the hub is only told about state
//! that actually changed. A rejected transition never reaches subscribers.

use mediscan_core::job::ERROR_CODE_USER_DELETED;
use mediscan_core::{CoreError, Job, JobFailure, JobStatus, JobUpdate};
use mediscan_db::JobStore;
use mediscan_events::NotificationHub;

/// Apply `update` to `job_id` and notify the job's subscribers.
///
/// Invalid transitions are logged and returned to the caller unchanged; the
/// stored record and the registry are left untouched.
pub async fn apply(
    jobs: &JobStore,
    hub: &NotificationHub,
    job_id: &str,
    update: &JobUpdate,
) -> Result<Job, CoreError> {
    let job = match jobs.apply_update(job_id, update).await {
        Ok(job) => job,
        Err(e @ CoreError::InvalidTransition { .. }) => {
            tracing::warn!(job_id, error = %e, "Rejected job transition");
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let delivered = hub.report_transition(&job).await;
    tracing::info!(
        job_id,
        status = %job.status,
        progress = job.progress,
        delivered,
        "Job transition committed",
    );

    Ok(job)
}

/// Cancel a job that is about to be deleted, so its subscribers see a final
/// `CANCELLED` update. Jobs that are already terminal are left as they are.
pub async fn cancel_for_deletion(
    jobs: &JobStore,
    hub: &NotificationHub,
    job: &Job,
) -> Result<Job, CoreError> {
    if job.is_terminal() {
        return Ok(job.clone());
    }

    let update = JobUpdate::new(JobStatus::Cancelled).with_error(JobFailure::new(
        ERROR_CODE_USER_DELETED,
        "Job was deleted by the user",
    ));
    apply(jobs, hub, &job.id, &update).await
}
