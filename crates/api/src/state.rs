use std::sync::Arc;

use mediscan_db::JobStore;
use mediscan_events::NotificationHub;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job records. Also serves as the hub's job directory.
    pub jobs: Arc<JobStore>,
    /// Subscription registry and dispatcher.
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// Build fresh state: an empty job store and a hub that looks jobs up in it.
    pub fn new(config: ServerConfig) -> Self {
        let jobs = Arc::new(JobStore::new());
        let hub = Arc::new(NotificationHub::new(
            Arc::clone(&jobs) as Arc<dyn mediscan_core::JobDirectory>,
            mediscan_events::HubConfig {
                delivery_timeout: std::time::Duration::from_millis(config.delivery_timeout_ms),
            },
        ));

        Self {
            config: Arc::new(config),
            jobs,
            hub,
        }
    }
}
