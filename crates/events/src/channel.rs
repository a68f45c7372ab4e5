//! Delivery capability the hub pushes notifications through.

use async_trait::async_trait;
use mediscan_core::Notification;
use tokio::sync::mpsc;

/// Errors a channel reports when a delivery does not go through.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The far end has gone away.
    #[error("Channel closed")]
    Closed,

    /// The channel did not accept the payload within the hub's deadline.
    #[error("Delivery timed out")]
    Timeout,

    /// Any other transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// An endpoint the hub can deliver [`Notification`]s to.
///
/// Implementations own serialization and framing. A returned error marks the
/// channel as broken: the hub drops every registration that points at it.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError>;

    /// Ask the far end to close. Called once during hub shutdown.
    async fn close(&self) {}
}

/// In-process channel backed by an unbounded queue.
///
/// Useful for background observers that want hub notifications without a
/// socket. Delivery fails once the receiver is dropped.
pub struct QueueChannel {
    sender: mpsc::UnboundedSender<Notification>,
}

impl QueueChannel {
    /// Create a channel and the receiver that drains it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl DeliveryChannel for QueueChannel {
    async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        self.sender
            .send(notification.clone())
            .map_err(|_| DeliveryError::Closed)
    }
}
