use std::sync::Arc;
use std::time::Duration;

use mediscan_core::Notification;
use mediscan_events::NotificationHub;

/// Spawn a background task that broadcasts a `heartbeat` notification to
/// every attached channel at `interval`.
///
/// Channels that fail the heartbeat are purged by the hub, so this also
/// reaps dead sockets whose close was never observed. The returned
/// `JoinHandle` is aborted during shutdown.
pub fn start_heartbeat(hub: Arc<NotificationHub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let delivered = hub.broadcast(&Notification::heartbeat()).await;
            tracing::debug!(delivered, "WebSocket heartbeat");
        }
    })
}
