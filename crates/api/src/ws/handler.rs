use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use mediscan_core::protocol::{ClientMessage, ServerReply, ERROR_CODE_INVALID_MESSAGE};
use mediscan_core::types::{new_id, JobId, SubscriberId};
use mediscan_events::{HubError, SharedChannel};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::ws::channel::WsChannel;

/// Query parameters accepted on `/ws/{client_id}`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    /// Subscribe to this job as soon as the socket opens.
    pub job_id: Option<JobId>,
}

/// GET /api/v1/ws
///
/// Upgrade to a WebSocket under a server-assigned client id.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let client_id = new_id();
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id, None))
}

/// GET /api/v1/ws/{client_id}?job_id=
///
/// Upgrade under a client-chosen id. Reconnecting with the same id replaces
/// the old socket and keeps its subscriptions.
pub async fn ws_handler_with_id(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(client_id): Path<SubscriberId>,
    Query(params): Query<ConnectParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id, params.job_id))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Attaches a [`WsChannel`] to the hub.
///   2. Spawns a sender task that drains the outbound queue into the sink.
///   3. Answers control messages on the current task.
///   4. Detaches on disconnect.
async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    client_id: SubscriberId,
    initial_job: Option<JobId>,
) {
    tracing::info!(conn_id = %client_id, "WebSocket connected");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let channel = WsChannel::new(tx);
    let shared: SharedChannel = Arc::new(channel.clone());
    state.hub.attach(client_id.clone(), Arc::clone(&shared)).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward queued frames to the WebSocket sink.
    let sender_conn_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    if let Some(job_id) = initial_job {
        let reply = handle_message(&state, &client_id, &shared, ClientMessage::Subscribe { job_id }).await;
        let _ = channel.send_json(&reply);
    }

    // Receiver loop: answer control messages.
    while let Some(result) = stream.next().await {
        let reply = match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(text.as_str()) {
                Ok(msg) => handle_message(&state, &client_id, &shared, msg).await,
                Err(e) => {
                    tracing::debug!(conn_id = %client_id, error = %e, "Malformed control message");
                    ServerReply::error(ERROR_CODE_INVALID_MESSAGE, format!("Invalid message: {e}"))
                }
            },
            Ok(Message::Binary(_)) => {
                ServerReply::error(ERROR_CODE_INVALID_MESSAGE, "Binary frames are not supported")
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Err(e) => {
                tracing::debug!(conn_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
        };

        if channel.send_json(&reply).is_err() {
            break;
        }
    }

    // Clean up: detach from the hub and stop the sender task.
    state.hub.detach(&client_id, &shared).await;
    send_task.abort();
    tracing::info!(conn_id = %client_id, "WebSocket disconnected");
}

/// Apply one control message and build the direct reply.
async fn handle_message(
    state: &AppState,
    client_id: &str,
    channel: &SharedChannel,
    msg: ClientMessage,
) -> ServerReply {
    match msg {
        ClientMessage::Subscribe { job_id } => {
            match state.hub.subscribe(&job_id, client_id, Arc::clone(channel)).await {
                Ok(status) => ServerReply::SubscriptionConfirmed { job_id, status },
                Err(HubError::JobNotFound(job_id)) => ServerReply::not_found(job_id),
            }
        }
        ClientMessage::Unsubscribe { job_id } => {
            state.hub.unsubscribe(&job_id, client_id).await;
            ServerReply::UnsubscriptionConfirmed { job_id }
        }
        ClientMessage::Ping { timestamp } => ServerReply::Pong {
            timestamp,
            server_time: chrono::Utc::now(),
        },
        ClientMessage::Status => ServerReply::StatusResponse {
            subscriber_id: client_id.to_string(),
            connections: state.hub.connection_count().await,
            subscriptions: state.hub.subscriptions_of(client_id).await,
        },
    }
}
