//! Mediscan notification infrastructure.
//!
//! - [`NotificationHub`]: process-wide registry of subscriptions and live
//!   channels, with per-job dispatch and broadcast.
//! - [`DeliveryChannel`]: the capability the hub delivers through, implemented
//!   by the WebSocket transport, test stubs, and [`QueueChannel`].

pub mod channel;
pub mod hub;

pub use channel::{DeliveryChannel, DeliveryError, QueueChannel};
pub use hub::{HubConfig, HubError, HubStats, NotificationHub, SharedChannel};
