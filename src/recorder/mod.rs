pub mod violation_recorder;

pub use violation_recorder::{ViolationRecorder, ViolationReport};
