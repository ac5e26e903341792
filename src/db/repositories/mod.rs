pub mod images;
pub mod subscriptions;
pub mod violation_logs;
