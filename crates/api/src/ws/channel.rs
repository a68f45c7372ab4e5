use async_trait::async_trait;
use axum::extract::ws::Message;
use mediscan_core::Notification;
use mediscan_events::{DeliveryChannel, DeliveryError};
use serde::Serialize;
use tokio::sync::mpsc;

/// Channel sender half for pushing frames to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Delivers hub notifications to one socket as JSON text frames.
///
/// Frames go through the connection's outbound queue, drained by its sender
/// task, so hub deliveries and direct replies share one ordered stream.
#[derive(Clone)]
pub struct WsChannel {
    sender: WsSender,
}

impl WsChannel {
    pub fn new(sender: WsSender) -> Self {
        Self { sender }
    }

    /// Serialize `payload` and queue it as a text frame.
    pub fn send_json<T: Serialize>(&self, payload: &T) -> Result<(), DeliveryError> {
        let text = serde_json::to_string(payload)
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        self.sender
            .send(Message::Text(text.into()))
            .map_err(|_| DeliveryError::Closed)
    }
}

#[async_trait]
impl DeliveryChannel for WsChannel {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.send_json(notification)
    }

    async fn close(&self) {
        let _ = self.sender.send(Message::Close(None));
    }
}
