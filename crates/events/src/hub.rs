//! Process-wide notification hub.
//!
//! [`NotificationHub`] owns two registries behind a single `RwLock`:
//!
//! - **connections**: every live channel, keyed by subscriber id. Broadcasts
//!   (job created/deleted, heartbeat, announcements) go here.
//! - **subscriptions**: job id -> subscriber id -> channel. Status updates for
//!   a job go only to its subscribers.
//!
//! Dispatch snapshots the target channels under the read lock, releases it,
//! and then delivers to every target concurrently with a per-channel
//! timeout. A channel that errors, panics or times out is purged from both
//! registries. Nothing ever propagates back to the caller of
//! [`notify`](NotificationHub::notify) or
//! [`broadcast`](NotificationHub::broadcast).

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;
use mediscan_core::types::{JobId, SubscriberId};
use mediscan_core::{Job, JobDirectory, JobStatus, Notification};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::channel::{DeliveryChannel, DeliveryError};

/// Default per-channel delivery deadline.
const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline for a channel to acknowledge a close request during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// A channel shared between the registries and in-flight deliveries.
pub type SharedChannel = Arc<dyn DeliveryChannel>;

// ---------------------------------------------------------------------------
// Configuration, errors, stats
// ---------------------------------------------------------------------------

/// Tunable parameters for the hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Upper bound on a single channel's `send`. Slower channels are treated
    /// as broken.
    pub delivery_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Subscribe was called for a job the job store does not know.
    #[error("Job {0} not found")]
    JobNotFound(JobId),
}

/// Snapshot of the registry sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Channels attached for broadcast delivery.
    pub connections: usize,
    /// Jobs with at least one subscriber.
    pub jobs: usize,
    /// Total `(job, subscriber)` registrations.
    pub subscriptions: usize,
    /// Attached subscriber ids, sorted.
    pub subscribers: Vec<SubscriberId>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Registry {
    connections: HashMap<SubscriberId, SharedChannel>,
    subscriptions: HashMap<JobId, HashMap<SubscriberId, SharedChannel>>,
}

impl Registry {
    fn subscription_count(&self) -> usize {
        self.subscriptions.values().map(HashMap::len).sum()
    }

    /// Remove every registration of `subscriber_id` that still points at
    /// `channel`. Registrations already replaced by a newer channel stay.
    fn purge(&mut self, subscriber_id: &str, channel: &SharedChannel) -> usize {
        let mut removed = 0;

        if self
            .connections
            .get(subscriber_id)
            .is_some_and(|current| Arc::ptr_eq(current, channel))
        {
            self.connections.remove(subscriber_id);
            removed += 1;
        }

        self.subscriptions.retain(|_, subscribers| {
            if subscribers
                .get(subscriber_id)
                .is_some_and(|current| Arc::ptr_eq(current, channel))
            {
                subscribers.remove(subscriber_id);
                removed += 1;
            }
            !subscribers.is_empty()
        });

        removed
    }
}

// ---------------------------------------------------------------------------
// NotificationHub
// ---------------------------------------------------------------------------

/// Registry of live channels and per-job subscriptions.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across request handlers and background tasks.
pub struct NotificationHub {
    registry: RwLock<Registry>,
    jobs: Arc<dyn JobDirectory>,
    config: HubConfig,
}

impl NotificationHub {
    /// Create an empty hub that validates job ids against `jobs`.
    pub fn new(jobs: Arc<dyn JobDirectory>, config: HubConfig) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            jobs,
            config,
        }
    }

    /// Register a live channel for broadcast delivery.
    ///
    /// Attaching an id that is already present replaces its channel (a client
    /// reconnecting under the same id) and repoints the subscriptions it held
    /// to the new channel.
    pub async fn attach(&self, subscriber_id: impl Into<SubscriberId>, channel: SharedChannel) {
        let subscriber_id = subscriber_id.into();
        let mut registry = self.registry.write().await;

        let reconnected = registry
            .connections
            .insert(subscriber_id.clone(), Arc::clone(&channel))
            .is_some();

        if reconnected {
            let mut resumed = 0;
            for subscribers in registry.subscriptions.values_mut() {
                if let Some(current) = subscribers.get_mut(&subscriber_id) {
                    *current = Arc::clone(&channel);
                    resumed += 1;
                }
            }
            tracing::info!(subscriber_id = %subscriber_id, resumed, "Subscriber reattached");
        } else {
            tracing::debug!(
                subscriber_id = %subscriber_id,
                connections = registry.connections.len(),
                "Subscriber attached",
            );
        }
    }

    /// Drop a channel and every subscription it holds.
    ///
    /// Does nothing if `subscriber_id` has since been reattached with a
    /// different channel.
    pub async fn detach(&self, subscriber_id: &str, channel: &SharedChannel) {
        let removed = self.registry.write().await.purge(subscriber_id, channel);
        tracing::debug!(subscriber_id, removed, "Subscriber detached");
    }

    /// Register interest of `subscriber_id` in `job_id`.
    ///
    /// Returns the job's current status. Unknown jobs are rejected without
    /// touching the registry. A job that is already terminal will never
    /// produce another update, so nothing is stored for it.
    ///
    /// The registry write lock is held across the status lookup. A terminal
    /// `notify` racing with this call therefore either sees the new
    /// subscription and drops it after delivery, or ran before the lookup and
    /// the lookup already reports the terminal status.
    pub async fn subscribe(
        &self,
        job_id: &str,
        subscriber_id: &str,
        channel: SharedChannel,
    ) -> Result<JobStatus, HubError> {
        let mut registry = self.registry.write().await;

        let status = self
            .jobs
            .job_status(job_id)
            .await
            .ok_or_else(|| HubError::JobNotFound(job_id.to_string()))?;

        if status.is_terminal() {
            tracing::debug!(job_id, subscriber_id, %status, "Subscribe to terminal job, not stored");
            return Ok(status);
        }

        let replaced = registry
            .subscriptions
            .entry(job_id.to_string())
            .or_default()
            .insert(subscriber_id.to_string(), channel)
            .is_some();

        tracing::info!(job_id, subscriber_id, replaced, "Subscribed to job");
        Ok(status)
    }

    /// Remove a subscription. Returns whether one existed.
    pub async fn unsubscribe(&self, job_id: &str, subscriber_id: &str) -> bool {
        let mut registry = self.registry.write().await;
        let Some(subscribers) = registry.subscriptions.get_mut(job_id) else {
            return false;
        };

        let removed = subscribers.remove(subscriber_id).is_some();
        if subscribers.is_empty() {
            registry.subscriptions.remove(job_id);
        }

        if removed {
            tracing::info!(job_id, subscriber_id, "Unsubscribed from job");
        }
        removed
    }

    /// Deliver `notification` to every subscriber of `job_id`.
    ///
    /// Returns the number of successful deliveries. Broken channels are
    /// purged. When the notification reports a terminal status the job's
    /// subscriptions are dropped after delivery.
    pub async fn notify(&self, job_id: &str, notification: &Notification) -> usize {
        let targets: Vec<(SubscriberId, SharedChannel)> = {
            let registry = self.registry.read().await;
            registry
                .subscriptions
                .get(job_id)
                .map(|subscribers| {
                    subscribers
                        .iter()
                        .map(|(id, channel)| (id.clone(), Arc::clone(channel)))
                        .collect()
                })
                .unwrap_or_default()
        };

        if targets.is_empty() {
            tracing::trace!(job_id, "No subscribers for job");
            return 0;
        }

        let (delivered, failed) = self.deliver_all(targets, notification).await;

        if !failed.is_empty() || notification.is_terminal() {
            let mut registry = self.registry.write().await;
            for (subscriber_id, channel) in &failed {
                registry.purge(subscriber_id, channel);
            }
            if notification.is_terminal() && registry.subscriptions.remove(job_id).is_some() {
                tracing::debug!(job_id, "Job reached terminal state, subscriptions dropped");
            }
        }

        tracing::debug!(job_id, delivered, failed = failed.len(), "Job notification dispatched");
        delivered
    }

    /// Build the status update for a committed job record and dispatch it.
    pub async fn report_transition(&self, job: &Job) -> usize {
        self.notify(&job.id, &Notification::job_update(job)).await
    }

    /// Deliver `notification` to every attached channel.
    pub async fn broadcast(&self, notification: &Notification) -> usize {
        let targets: Vec<(SubscriberId, SharedChannel)> = {
            let registry = self.registry.read().await;
            registry
                .connections
                .iter()
                .map(|(id, channel)| (id.clone(), Arc::clone(channel)))
                .collect()
        };

        if targets.is_empty() {
            return 0;
        }

        let (delivered, failed) = self.deliver_all(targets, notification).await;

        if !failed.is_empty() {
            let mut registry = self.registry.write().await;
            for (subscriber_id, channel) in &failed {
                registry.purge(subscriber_id, channel);
            }
        }

        tracing::debug!(kind = ?notification.kind, delivered, failed = failed.len(), "Broadcast dispatched");
        delivered
    }

    /// Current registry sizes.
    pub async fn stats(&self) -> HubStats {
        let registry = self.registry.read().await;
        let mut subscribers: Vec<SubscriberId> = registry.connections.keys().cloned().collect();
        subscribers.sort();

        HubStats {
            connections: registry.connections.len(),
            jobs: registry.subscriptions.len(),
            subscriptions: registry.subscription_count(),
            subscribers,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// Number of subscribers currently registered for `job_id`.
    pub async fn subscriber_count(&self, job_id: &str) -> usize {
        self.registry
            .read()
            .await
            .subscriptions
            .get(job_id)
            .map_or(0, HashMap::len)
    }

    /// Number of jobs `subscriber_id` is subscribed to.
    pub async fn subscriptions_of(&self, subscriber_id: &str) -> usize {
        self.registry
            .read()
            .await
            .subscriptions
            .values()
            .filter(|subscribers| subscribers.contains_key(subscriber_id))
            .count()
    }

    /// Ask every attached channel to close, then clear both registries.
    pub async fn shutdown(&self) {
        let registry = std::mem::take(&mut *self.registry.write().await);
        let count = registry.connections.len();

        join_all(registry.connections.into_values().map(|channel| async move {
            let _ = tokio::time::timeout(CLOSE_TIMEOUT, channel.close()).await;
        }))
        .await;

        tracing::info!(count, "Closed all notification channels");
    }

    // ---- private helpers ----

    /// Deliver to all targets concurrently. Returns the success count and
    /// the targets whose delivery failed.
    async fn deliver_all(
        &self,
        targets: Vec<(SubscriberId, SharedChannel)>,
        notification: &Notification,
    ) -> (usize, Vec<(SubscriberId, SharedChannel)>) {
        let timeout = self.config.delivery_timeout;

        let outcomes = join_all(targets.into_iter().map(|(subscriber_id, channel)| async move {
            let send = AssertUnwindSafe(channel.send(notification)).catch_unwind();
            let outcome = match tokio::time::timeout(timeout, send).await {
                Ok(Ok(result)) => result,
                Ok(Err(_panic)) => Err(DeliveryError::Transport("channel panicked".into())),
                Err(_elapsed) => Err(DeliveryError::Timeout),
            };
            (subscriber_id, channel, outcome)
        }))
        .await;

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (subscriber_id, channel, outcome) in outcomes {
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        subscriber_id = %subscriber_id,
                        job_id = ?notification.job_id,
                        error = %e,
                        "Delivery failed, dropping channel",
                    );
                    failed.push((subscriber_id, channel));
                }
            }
        }

        (delivered, failed)
    }
}
