//! System-wide announcements pushed to every connected observer.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mediscan_core::Notification;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /api/v1/announcements`.
#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    /// Free-form category, e.g. `maintenance` or `model_update`.
    pub message_type: String,
    #[serde(default)]
    pub content: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AnnouncementReceipt {
    /// Number of channels the announcement was delivered to.
    pub recipients: usize,
}

/// POST /api/v1/announcements
pub async fn announce(
    State(state): State<AppState>,
    Json(input): Json<AnnouncementRequest>,
) -> AppResult<impl IntoResponse> {
    if input.message_type.trim().is_empty() {
        return Err(AppError::BadRequest("message_type must not be empty".into()));
    }

    let recipients = state
        .hub
        .broadcast(&Notification::announcement(input.message_type.clone(), input.content))
        .await;
    tracing::info!(message_type = %input.message_type, recipients, "Announcement sent");

    Ok(Json(DataResponse {
        data: AnnouncementReceipt { recipients },
    }))
}
