//! WebSocket transport for the notification hub.
//!
//! Provides the HTTP upgrade handlers, the [`WsChannel`] adapter through
//! which the hub delivers to a socket, and the heartbeat task.

mod channel;
mod handler;
mod heartbeat;

pub use channel::WsChannel;
pub use handler::{ws_handler, ws_handler_with_id};
pub use heartbeat::start_heartbeat;
