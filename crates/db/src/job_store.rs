//! In-memory job store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use mediscan_core::job::validate_new_job;
use mediscan_core::types::{new_id, JobId};
use mediscan_core::{CoreError, Job, JobDirectory, JobStatus, JobUpdate, NewJob};
use serde::Deserialize;
use tokio::sync::RwLock;

/// Default page size for [`JobStore::list`].
const DEFAULT_LIMIT: usize = 50;

/// Upper bound on the page size for [`JobStore::list`].
const MAX_LIMIT: usize = 100;

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Default, Deserialize)]
pub struct JobListQuery {
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Filter by requesting user.
    pub requested_by: Option<String>,
    /// Maximum number of results. Defaults to 50, capped at 100.
    pub limit: Option<usize>,
    /// Number of results to skip. Defaults to 0.
    pub offset: Option<usize>,
}

/// Owns every job record.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new job in `PENDING` status.
    pub async fn create(&self, input: NewJob) -> Result<Job, CoreError> {
        validate_new_job(&input)?;

        let job = Job::new(new_id(), input, Utc::now());
        self.jobs.write().await.insert(job.id.clone(), job.clone());

        tracing::debug!(job_id = %job.id, "Job created");
        Ok(job)
    }

    pub async fn find_by_id(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// List jobs, newest first.
    pub async fn list(&self, query: &JobListQuery) -> Vec<Job> {
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = query.offset.unwrap_or(0);

        let jobs = self.jobs.read().await;
        let mut matching: Vec<&Job> = jobs
            .values()
            .filter(|job| query.status.map_or(true, |s| job.status == s))
            .filter(|job| {
                query
                    .requested_by
                    .as_deref()
                    .map_or(true, |user| job.requested_by.as_deref() == Some(user))
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Apply a status transition and return the committed record.
    ///
    /// Fails with `NotFound` for unknown ids and `InvalidTransition` or
    /// `Validation` when the state machine rejects the update. A rejected
    /// update leaves the stored record unchanged.
    pub async fn apply_update(&self, job_id: &str, update: &JobUpdate) -> Result<Job, CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id).ok_or_else(|| CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        })?;

        job.apply(update, Utc::now())?;
        Ok(job.clone())
    }

    /// Remove a job, returning the record if it existed.
    pub async fn delete(&self, job_id: &str) -> Option<Job> {
        self.jobs.write().await.remove(job_id)
    }

    pub async fn count(&self) -> usize {
        self.jobs.read().await.len()
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobDirectory for JobStore {
    async fn job_status(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().await.get(job_id).map(|job| job.status)
    }
}
