//! Subscriber socket protocol.
//!
//! Clients send [`ClientMessage`]s tagged by `op`; the server answers on the
//! same socket with [`ServerReply`]s tagged by `type`, interleaved with
//! [`Notification`]s pushed by the hub. [`ServerMessage`] parses either.

use serde::{Deserialize, Serialize};

use crate::job::JobStatus;
use crate::notification::Notification;
use crate::types::{JobId, Timestamp};

/// The job id does not exist in the job store.
pub const ERROR_CODE_NOT_FOUND: &str = "NOT_FOUND";

/// The frame was not valid JSON or not a known control message.
pub const ERROR_CODE_INVALID_MESSAGE: &str = "INVALID_MESSAGE";

/// Control message sent by a subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe {
        job_id: JobId,
    },
    Unsubscribe {
        job_id: JobId,
    },
    Ping {
        #[serde(default)]
        timestamp: Option<String>,
    },
    Status,
}

/// Direct reply to a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    SubscriptionConfirmed {
        job_id: JobId,
        status: JobStatus,
    },
    UnsubscriptionConfirmed {
        job_id: JobId,
    },
    Pong {
        #[serde(default)]
        timestamp: Option<String>,
        server_time: Timestamp,
    },
    StatusResponse {
        subscriber_id: String,
        connections: usize,
        subscriptions: usize,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
    },
}

impl ServerReply {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
            job_id: None,
        }
    }

    pub fn not_found(job_id: impl Into<JobId>) -> Self {
        let job_id = job_id.into();
        Self::Error {
            code: ERROR_CODE_NOT_FOUND.to_string(),
            message: format!("Job {job_id} not found"),
            job_id: Some(job_id),
        }
    }
}

/// Anything the server may push down a subscriber socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Reply(ServerReply),
    Notification(Notification),
}
