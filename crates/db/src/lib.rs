//! Job store for Mediscan.
//!
//! Holds analysis job records and enforces the status state machine on every
//! write. Records live in memory; the notification hub observes committed
//! transitions but never owns them.

pub mod job_store;

pub use job_store::{JobListQuery, JobStore};
