/// Opaque job identifier (a UUID v4 rendered as a string).
pub type JobId = String;

/// Identifies one delivery channel, usually a WebSocket connection.
pub type SubscriberId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh opaque identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
