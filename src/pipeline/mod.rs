pub mod debouncer;
pub mod reporter;
pub mod session;

pub use debouncer::DetectionDebouncer;
pub use reporter::HttpReporter;
pub use session::{
    CameraSession, Frame, FrameClassifier, LocationProvider, SessionSummary, SnapshotSource,
    ViolationSink,
};
