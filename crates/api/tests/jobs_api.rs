//! Integration tests for the job, announcement and stats endpoints.
//!
//! Requests go through the full middleware stack via `oneshot`; hub
//! deliveries are observed through in-process queue channels registered on
//! the shared state.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, build_test_app, create_job, delete, get, post_json};
use mediscan_core::{JobStatus, NotificationKind};
use mediscan_events::QueueChannel;
use serde_json::json;

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_check_returns_ok_with_request_id() {
    let (app, _) = build_test_app();
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("response must carry x-request-id");
    assert_eq!(request_id.to_str().unwrap().len(), 36);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["connections"], 0);
}

// ---------------------------------------------------------------------------
// Create / get / list
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_job_starts_pending() {
    let (app, _) = build_test_app();
    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({"image_id": "img-9", "model_id": "chest-xray-v2", "requested_by": "dr-lee"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "PENDING");
    assert_eq!(json["data"]["progress"], 0.0);
    assert_eq!(json["data"]["requested_by"], "dr-lee");
}

#[tokio::test]
async fn create_job_rejects_blank_image() {
    let (app, _) = build_test_app();
    let response = post_json(
        app,
        "/api/v1/jobs",
        json!({"image_id": "  ", "model_id": "chest-xray-v2"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn create_job_broadcasts_job_created() {
    let (app, state) = build_test_app();
    let (channel, mut rx) = QueueChannel::new();
    state.hub.attach("observer", Arc::new(channel)).await;

    let job_id = create_job(app).await;

    let notification = rx.try_recv().expect("observer should see job_created");
    assert_eq!(notification.kind, NotificationKind::JobCreated);
    assert_eq!(notification.job_id.as_deref(), Some(job_id.as_str()));
    assert_eq!(notification.data.unwrap()["image_id"], "img-1");
}

#[tokio::test]
async fn get_unknown_job_is_404() {
    let (app, _) = build_test_app();
    let response = get(app, "/api/v1/jobs/zzz").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Job with id zzz not found");
}

#[tokio::test]
async fn list_jobs_filters_by_status() {
    let (app, _) = build_test_app();
    let first = create_job(app.clone()).await;
    let _second = create_job(app.clone()).await;
    post_json(
        app.clone(),
        &format!("/api/v1/jobs/{first}/transitions"),
        json!({"status": "ANALYZING"}),
    )
    .await;

    let json = body_json(get(app.clone(), "/api/v1/jobs").await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let json = body_json(get(app, "/api/v1/jobs?status=ANALYZING").await).await;
    let data = json["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], first.as_str());
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transitions_reach_subscriber_in_order() {
    let (app, state) = build_test_app();
    let job_id = create_job(app.clone()).await;
    let (channel, mut rx) = QueueChannel::new();
    state
        .hub
        .subscribe(&job_id, "s1", Arc::new(channel))
        .await
        .unwrap();

    let uri = format!("/api/v1/jobs/{job_id}/transitions");
    for body in [
        json!({"status": "ANALYZING", "progress": 10.0}),
        json!({"status": "ANALYZING", "progress": 50.0}),
        json!({"status": "COMPLETE", "result": {"finding": "normal", "confidence": 0.93}}),
    ] {
        let response = post_json(app.clone(), &uri, body).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let received: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
    let statuses: Vec<_> = received.iter().filter_map(|n| n.status).collect();
    assert_eq!(
        statuses,
        vec![JobStatus::Analyzing, JobStatus::Analyzing, JobStatus::Complete]
    );
    assert_eq!(received[2].progress, Some(100.0));
    assert_eq!(received[2].result.as_ref().unwrap()["finding"], "normal");

    // Terminal update drops the subscription.
    assert_eq!(state.hub.subscriber_count(&job_id).await, 0);
}

#[tokio::test]
async fn invalid_transition_is_409_and_not_broadcast() {
    let (app, state) = build_test_app();
    let job_id = create_job(app.clone()).await;
    let (channel, mut rx) = QueueChannel::new();
    state
        .hub
        .subscribe(&job_id, "s1", Arc::new(channel))
        .await
        .unwrap();

    let response = post_json(
        app.clone(),
        &format!("/api/v1/jobs/{job_id}/transitions"),
        json!({"status": "COMPLETE"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INVALID_TRANSITION");
    assert!(rx.try_recv().is_err());

    let json = body_json(get(app, &format!("/api/v1/jobs/{job_id}")).await).await;
    assert_eq!(json["data"]["status"], "PENDING");
}

#[tokio::test]
async fn failed_without_error_is_validation_error() {
    let (app, _) = build_test_app();
    let job_id = create_job(app.clone()).await;
    let uri = format!("/api/v1/jobs/{job_id}/transitions");
    post_json(app.clone(), &uri, json!({"status": "ANALYZING"})).await;

    let response = post_json(app, &uri, json!({"status": "FAILED"})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn transition_for_unknown_job_is_404() {
    let (app, _) = build_test_app();
    let response = post_json(
        app,
        "/api/v1/jobs/missing/transitions",
        json!({"status": "ANALYZING"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_active_job_cancels_then_broadcasts() {
    let (app, state) = build_test_app();
    let job_id = create_job(app.clone()).await;

    let (subscriber, mut sub_rx) = QueueChannel::new();
    state
        .hub
        .subscribe(&job_id, "watcher", Arc::new(subscriber))
        .await
        .unwrap();
    let (observer, mut obs_rx) = QueueChannel::new();
    state.hub.attach("dashboard", Arc::new(observer)).await;

    let response = delete(app.clone(), &format!("/api/v1/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let final_update = sub_rx.try_recv().unwrap();
    assert_eq!(final_update.status, Some(JobStatus::Cancelled));
    assert_eq!(final_update.error.unwrap().code, "USER_DELETED");

    let deleted = obs_rx.try_recv().unwrap();
    assert_eq!(deleted.kind, NotificationKind::JobDeleted);
    assert_eq!(deleted.status, Some(JobStatus::Cancelled));

    let response = get(app, &format!("/api/v1/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_unknown_job_is_404() {
    let (app, _) = build_test_app();
    let response = delete(app, "/api/v1/jobs/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Announcements / stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn announcement_reaches_every_attached_channel() {
    let (app, state) = build_test_app();
    let (c1, mut rx1) = QueueChannel::new();
    let (c2, mut rx2) = QueueChannel::new();
    state.hub.attach("a", Arc::new(c1)).await;
    state.hub.attach("b", Arc::new(c2)).await;

    let response = post_json(
        app,
        "/api/v1/announcements",
        json!({"message_type": "maintenance", "content": {"window": "02:00-03:00"}}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["recipients"], 2);

    for rx in [&mut rx1, &mut rx2] {
        let n = rx.try_recv().unwrap();
        assert_eq!(n.kind, NotificationKind::Announcement);
        assert_eq!(n.data.unwrap()["message_type"], "maintenance");
    }
}

#[tokio::test]
async fn announcement_requires_message_type() {
    let (app, _) = build_test_app();
    let response = post_json(app, "/api/v1/announcements", json!({"message_type": ""})).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn stats_report_registry_sizes() {
    let (app, state) = build_test_app();
    let job_id = create_job(app.clone()).await;
    let (channel, _rx) = QueueChannel::new();
    let channel: mediscan_events::SharedChannel = Arc::new(channel);
    state.hub.attach("s1", Arc::clone(&channel)).await;
    state.hub.subscribe(&job_id, "s1", channel).await.unwrap();

    let json = body_json(get(app, "/api/v1/notifications/stats").await).await;

    assert_eq!(json["data"]["connections"], 1);
    assert_eq!(json["data"]["jobs"], 1);
    assert_eq!(json["data"]["subscriptions"], 1);
    assert_eq!(json["data"]["subscribers"][0], "s1");
}
