//! Job status engine.
//!
//! Commits status transitions to the job store and reports each committed
//! transition to the notification hub.

pub mod transitions;
