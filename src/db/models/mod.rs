pub mod detection_models;
pub mod subscription_models;
pub mod violation_models;

pub use detection_models::{frame_contains_class, BoundingBox, Detection, ViolationEvent};
pub use subscription_models::{PushSubscription, SubscriptionKeys};
pub use violation_models::{
    format_log_time, parse_log_time, GeoLocation, NewViolation, TimeWindow, ViolationRecord,
};
