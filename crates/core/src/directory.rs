//! Read-only view of the job store used by the notification hub.

use async_trait::async_trait;

use crate::job::JobStatus;

/// Answers "does this job exist, and where is it in its lifecycle?".
///
/// Implemented by the job store. The hub consults it on subscribe so that
/// unknown job ids are rejected before any registry mutation.
#[async_trait]
pub trait JobDirectory: Send + Sync {
    /// Current status of `job_id`, or `None` when no such job exists.
    async fn job_status(&self, job_id: &str) -> Option<JobStatus>;
}
