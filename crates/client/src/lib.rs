//! Subscriber-side client for the Mediscan notification hub.
//!
//! - [`reconnect`]: transport-independent connection state machine with
//!   bounded exponential backoff.
//! - [`client`]: WebSocket connector for the hub endpoint.
//! - [`session`]: long-lived subscriber session that reconnects and
//!   re-subscribes on its own.

pub mod client;
pub mod reconnect;
pub mod session;

pub use client::{ClientError, HubClient, HubConnection};
pub use reconnect::{
    next_delay, reconnect_loop, ConnectionState, Connector, ReconnectConfig, ReconnectError,
    Reconnector,
};
pub use session::{spawn_session, SessionEvent, SessionHandle};
