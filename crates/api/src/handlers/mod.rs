pub mod announcements;
pub mod jobs;
pub mod notifications;
