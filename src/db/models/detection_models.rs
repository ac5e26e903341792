use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Center-based bounding box, in source frame units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One detected object in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub color: Option<String>,
}

impl Detection {
    pub fn is_class(&self, class: &str) -> bool {
        self.class.eq_ignore_ascii_case(class)
    }
}

/// Whether any detection in a frame matches the target class
pub fn frame_contains_class(detections: &[Detection], class: &str) -> bool {
    detections.iter().any(|d| d.is_class(class))
}

/// A confirmed violation, emitted once presence held for the whole
/// confirmation window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationEvent {
    /// Camera session that confirmed the violation
    pub session_id: Uuid,
    pub triggered_at: DateTime<Utc>,
}

impl ViolationEvent {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            session_id,
            triggered_at: Utc::now(),
        }
    }
}
