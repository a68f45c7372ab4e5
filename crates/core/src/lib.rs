//! Domain types shared by every Mediscan crate.
//!
//! This crate has zero internal deps: the job record and its status state
//! machine, the outbound [`Notification`] payload, the subscriber wire
//! protocol, and the [`JobDirectory`] seam through which the notification
//! hub asks the job store whether a job exists.

pub mod directory;
pub mod error;
pub mod job;
pub mod notification;
pub mod protocol;
pub mod types;

pub use directory::JobDirectory;
pub use error::CoreError;
pub use job::{Job, JobFailure, JobStatus, JobUpdate, NewJob};
pub use notification::{Notification, NotificationKind};
