use crate::db::models::ViolationRecord;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Event types pushed to subscribers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    ViolationRecorded,
    SystemStartup,
    SystemShutdown,
}

impl Display for EventType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ViolationRecorded => write!(f, "violation.recorded"),
            Self::SystemStartup => write!(f, "system.startup"),
            Self::SystemShutdown => write!(f, "system.shutdown"),
        }
    }
}

/// Event message structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    /// Unique event ID
    pub id: Uuid,
    /// Event type
    pub event_type: EventType,
    /// Event source ID (e.g., camera session ID)
    pub source_id: Option<Uuid>,
    /// Event timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Human readable summary, shown as the notification body
    pub message: String,
    /// Event data payload
    pub payload: serde_json::Value,
}

impl EventMessage {
    /// Create a new event message
    pub fn new<T: Serialize>(
        event_type: EventType,
        source_id: Option<Uuid>,
        message: impl Into<String>,
        payload: T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_type,
            source_id,
            timestamp: chrono::Utc::now(),
            message: message.into(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Notification for a freshly persisted violation
    pub fn violation_recorded(record: &ViolationRecord) -> Result<Self, serde_json::Error> {
        Self::new(
            EventType::ViolationRecorded,
            None,
            format!(
                "Cigarette detected at {} on {}",
                record.log_location, record.log_time
            ),
            record,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_event_carries_location_and_time() {
        let record = ViolationRecord {
            log_id: 3,
            log_time: "October 18th 2026, 3:04:05 pm".to_string(),
            log_location: "14.5, 121.0".to_string(),
            log_image_path: "/images/violation.jpg".to_string(),
        };

        let event = EventMessage::violation_recorded(&record).unwrap();
        assert_eq!(event.event_type, EventType::ViolationRecorded);
        assert!(event.message.contains("14.5, 121.0"));
        assert!(event.message.contains("October 18th 2026, 3:04:05 pm"));
        assert_eq!(event.payload["logID"], 3);
        assert_eq!(event.event_type.to_string(), "violation.recorded");
    }
}
