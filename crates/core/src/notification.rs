//! Outbound notification payload pushed to subscribers.
//!
//! A single flat record covers both per-job status updates and the
//! broadcast events every observer sees (job created/deleted, heartbeat,
//! announcements). Absent fields are omitted on the wire.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::job::{Job, JobFailure, JobStatus};
use crate::types::{JobId, Timestamp};

/// Discriminates what a [`Notification`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A tracked job changed status or progress.
    JobUpdate,
    /// A new job was created (broadcast).
    JobCreated,
    /// A job was deleted (broadcast).
    JobDeleted,
    /// Periodic keep-alive (broadcast).
    Heartbeat,
    /// System-wide announcement (broadcast).
    Announcement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: Timestamp,
}

impl Notification {
    fn bare(kind: NotificationKind) -> Self {
        Self {
            kind,
            job_id: None,
            status: None,
            progress: None,
            result: None,
            error: None,
            data: None,
            timestamp: Utc::now(),
        }
    }

    /// Status update describing the committed state of `job`.
    pub fn job_update(job: &Job) -> Self {
        Self {
            job_id: Some(job.id.clone()),
            status: Some(job.status),
            progress: Some(job.progress),
            result: job.result.clone(),
            error: job.error.clone(),
            ..Self::bare(NotificationKind::JobUpdate)
        }
    }

    pub fn job_created(job: &Job) -> Self {
        Self::with_job(NotificationKind::JobCreated, job)
    }

    pub fn job_deleted(job: &Job) -> Self {
        Self::with_job(NotificationKind::JobDeleted, job)
    }

    pub fn heartbeat() -> Self {
        Self {
            data: Some(serde_json::json!({ "server_status": "healthy" })),
            ..Self::bare(NotificationKind::Heartbeat)
        }
    }

    pub fn announcement(message_type: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            data: Some(serde_json::json!({
                "message_type": message_type.into(),
                "content": content,
            })),
            ..Self::bare(NotificationKind::Announcement)
        }
    }

    /// Whether this notification reports a job entering a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(JobStatus::is_terminal)
    }

    fn with_job(kind: NotificationKind, job: &Job) -> Self {
        Self {
            job_id: Some(job.id.clone()),
            status: Some(job.status),
            data: serde_json::to_value(job).ok(),
            ..Self::bare(kind)
        }
    }
}
