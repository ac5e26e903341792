pub mod event;
pub mod notifier;

pub use event::{EventMessage, EventType};
pub use notifier::{DeliveryReport, NoopNotifier, Notifier, PushNotifier};
