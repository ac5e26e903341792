pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod messaging;
pub mod pipeline;
pub mod recorder;

// Re-export main components for easier use
pub use config::Config;
pub use db::StorageService;
pub use error::Error;
pub use pipeline::{CameraSession, DetectionDebouncer, HttpReporter};
pub use recorder::{ViolationRecorder, ViolationReport};
