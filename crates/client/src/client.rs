//! WebSocket connector for the notification hub.
//!
//! [`HubClient`] holds the endpoint and the client id. Every connection it
//! opens uses the same id, so the server treats a reconnect as the same
//! subscriber and repoints its subscriptions to the new socket.

use async_trait::async_trait;
use mediscan_core::types::{new_id, SubscriberId};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::reconnect::Connector;

/// A live socket to the hub.
pub type HubConnection = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct HubClient {
    ws_url: String,
    client_id: SubscriberId,
}

impl HubClient {
    /// * `base_url`  - server base URL, e.g. `ws://host:8000`.
    /// * `client_id` - stable subscriber id used on every connection.
    pub fn new(base_url: &str, client_id: impl Into<SubscriberId>) -> Self {
        let client_id = client_id.into();
        let ws_url = format!("{}/api/v1/ws/{client_id}", base_url.trim_end_matches('/'));
        Self { ws_url, client_id }
    }

    /// Like [`new`](Self::new) with a freshly generated client id.
    pub fn with_random_id(base_url: &str) -> Self {
        Self::new(base_url, new_id())
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Open a WebSocket to the hub endpoint.
    pub async fn connect(&self) -> Result<HubConnection, ClientError> {
        let (ws_stream, _response) = connect_async(self.ws_url.as_str()).await.map_err(|e| {
            ClientError::Connection(format!("Failed to connect to {}: {e}", self.ws_url))
        })?;

        tracing::debug!(client_id = %self.client_id, "Connected to {}", self.ws_url);
        Ok(ws_stream)
    }
}

#[async_trait]
impl Connector for HubClient {
    type Connection = HubConnection;
    type Error = ClientError;

    fn target(&self) -> &str {
        &self.ws_url
    }

    async fn connect(&self) -> Result<HubConnection, ClientError> {
        HubClient::connect(self).await
    }
}

/// Errors that can occur when working with the hub client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A protocol-level error on an established connection.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The session task has stopped.
    #[error("Session closed")]
    SessionClosed,
}
