#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use mediscan_api::config::ServerConfig;
use mediscan_api::router::build_app_router;
use mediscan_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        heartbeat_interval_secs: 30,
        delivery_timeout_ms: 500,
    }
}

/// Fresh state plus the full application router built from it.
///
/// Uses the same middleware stack as `main.rs`. The state is returned so
/// tests can reach the hub and job store directly.
pub fn build_test_app() -> (Router, AppState) {
    let state = AppState::new(test_config());
    (build_app_with(state.clone()), state)
}

/// The full application router over existing state.
pub fn build_app_with(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

/// Serve the app on an ephemeral local port. Returns the bound address.
pub async fn spawn_server() -> (std::net::SocketAddr, AppState) {
    let (app, state) = build_test_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

/// Create a job through the API and return its id.
pub async fn create_job(app: Router) -> String {
    let response = post_json(
        app,
        "/api/v1/jobs",
        serde_json::json!({"image_id": "img-1", "model_id": "chest-xray-v2"}),
    )
    .await;
    body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string()
}
