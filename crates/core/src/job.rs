//! Analysis job record and its status state machine.
//!
//! ```text
//! PENDING ──> ANALYZING ──> COMPLETE
//!    │            │    └──> FAILED
//!    └────────────┴───────> CANCELLED
//! ```
//!
//! `ANALYZING -> ANALYZING` is a progress update. Terminal states accept no
//! further transitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lowest accepted progress value.
pub const PROGRESS_MIN: f64 = 0.0;

/// Highest accepted progress value. A completed job always reports this.
pub const PROGRESS_MAX: f64 = 100.0;

/// Error code recorded when a user deletes a job that is still active.
pub const ERROR_CODE_USER_DELETED: &str = "USER_DELETED";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Analyzing,
    Complete,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Return the wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Analyzing => "ANALYZING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether no further transition may leave this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Cancelled)
    }

    /// Statuses reachable from `self` in one transition.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        match self {
            Self::Pending => &[Self::Analyzing, Self::Cancelled],
            Self::Analyzing => &[
                Self::Analyzing,
                Self::Complete,
                Self::Failed,
                Self::Cancelled,
            ],
            Self::Complete | Self::Failed | Self::Cancelled => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Error payload carried by a failed (or cancelled) job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFailure {
    pub code: String,
    pub message: String,
}

impl JobFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A tracked analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub image_id: String,
    pub model_id: String,
    #[serde(default)]
    pub requested_by: Option<String>,
    pub status: JobStatus,
    pub progress: f64,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JobFailure>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a job via `POST /api/v1/jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJob {
    pub image_id: String,
    pub model_id: String,
    #[serde(default)]
    pub requested_by: Option<String>,
}

/// A requested status transition, reported by whoever runs the analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JobFailure>,
}

impl JobUpdate {
    /// An update that only moves the status.
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            progress: None,
            result: None,
            error: None,
        }
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_result(mut self, result: serde_json::Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: JobFailure) -> Self {
        self.error = Some(error);
        self
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a job creation request.
pub fn validate_new_job(input: &NewJob) -> Result<(), CoreError> {
    if input.image_id.trim().is_empty() {
        return Err(CoreError::Validation("image_id must not be empty".into()));
    }
    if input.model_id.trim().is_empty() {
        return Err(CoreError::Validation("model_id must not be empty".into()));
    }
    Ok(())
}

/// Validate that `progress` is a finite value in `[0, 100]`.
pub fn validate_progress(progress: f64) -> Result<(), CoreError> {
    if !progress.is_finite() || !(PROGRESS_MIN..=PROGRESS_MAX).contains(&progress) {
        return Err(CoreError::Validation(format!(
            "progress must be between {PROGRESS_MIN} and {PROGRESS_MAX}, got {progress}"
        )));
    }
    Ok(())
}

/// Check the payload rules for a transition into `update.status`.
fn validate_payload(job: &Job, update: &JobUpdate) -> Result<(), CoreError> {
    if let Some(progress) = update.progress {
        validate_progress(progress)?;
    }

    match update.status {
        JobStatus::Pending => Ok(()),
        JobStatus::Analyzing => {
            if update.result.is_some() || update.error.is_some() {
                return Err(CoreError::Validation(
                    "ANALYZING updates carry neither result nor error".into(),
                ));
            }
            match update.progress {
                Some(progress) if progress < job.progress => Err(CoreError::Validation(format!(
                    "progress may not decrease ({} -> {progress})",
                    job.progress
                ))),
                _ => Ok(()),
            }
        }
        JobStatus::Complete => {
            if update.error.is_some() {
                return Err(CoreError::Validation(
                    "a COMPLETE job cannot carry an error".into(),
                ));
            }
            Ok(())
        }
        JobStatus::Failed => {
            if update.result.is_some() {
                return Err(CoreError::Validation(
                    "a FAILED job cannot carry a result".into(),
                ));
            }
            if update.error.is_none() {
                return Err(CoreError::Validation(
                    "a FAILED job requires an error".into(),
                ));
            }
            Ok(())
        }
        JobStatus::Cancelled => {
            if update.result.is_some() {
                return Err(CoreError::Validation(
                    "a CANCELLED job cannot carry a result".into(),
                ));
            }
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

impl Job {
    /// Create a job in the initial `PENDING` state.
    pub fn new(id: JobId, input: NewJob, now: Timestamp) -> Self {
        Self {
            id,
            image_id: input.image_id,
            model_id: input.model_id,
            requested_by: input.requested_by,
            status: JobStatus::Pending,
            progress: PROGRESS_MIN,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a transition. On error the job is left untouched.
    pub fn apply(&mut self, update: &JobUpdate, now: Timestamp) -> Result<(), CoreError> {
        if !self.status.can_transition(update.status) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: update.status,
            });
        }
        validate_payload(self, update)?;

        self.progress = match update.status {
            JobStatus::Complete => PROGRESS_MAX,
            _ => update.progress.unwrap_or(self.progress),
        };
        match update.status {
            JobStatus::Complete => self.result = update.result.clone(),
            JobStatus::Failed | JobStatus::Cancelled => self.error = update.error.clone(),
            JobStatus::Pending | JobStatus::Analyzing => {}
        }
        self.status = update.status;
        self.updated_at = now;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
