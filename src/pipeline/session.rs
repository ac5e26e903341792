use crate::config::DetectionConfig;
use crate::db::models::{frame_contains_class, Detection, GeoLocation, ViolationEvent, ViolationRecord};
use crate::error::Error;
use crate::pipeline::debouncer::DetectionDebouncer;
use crate::recorder::ViolationReport;
use anyhow::Result;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

/// Number of frame intervals the FPS estimate averages over
const FPS_WINDOW: usize = 30;

/// One captured video frame, handed to the classifier as-is
#[derive(Debug, Clone)]
pub struct Frame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Hosted or local object detector
#[async_trait]
pub trait FrameClassifier: Send + Sync {
    async fn classify(&self, frame: &Frame) -> Result<Vec<Detection>>;
}

/// Device geolocation; `None` until a fix is available
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_location(&self) -> Option<GeoLocation>;
}

/// Encoded still of the current camera view
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn capture_snapshot(&self) -> Result<Vec<u8>>;
}

/// Where confirmed violations are reported
#[async_trait]
pub trait ViolationSink: Send + Sync {
    async fn report(&self, report: ViolationReport) -> Result<ViolationRecord>;
}

/// Totals for one finished session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub frames: u64,
    pub skipped_frames: u64,
    pub violations_reported: u64,
    pub violations_dropped: u64,
}

/// Rolling frames-per-second over the last few frame intervals
#[derive(Debug, Default)]
struct FrameRate {
    last: Option<Instant>,
    intervals: VecDeque<Duration>,
}

impl FrameRate {
    fn tick(&mut self, now: Instant) {
        if let Some(last) = self.last {
            self.intervals.push_back(now - last);
            if self.intervals.len() > FPS_WINDOW {
                self.intervals.pop_front();
            }
        }
        self.last = Some(now);
    }

    fn fps(&self) -> Option<f64> {
        let total: Duration = self.intervals.iter().sum();
        if self.intervals.is_empty() || total.is_zero() {
            return None;
        }
        Some(self.intervals.len() as f64 / total.as_secs_f64())
    }
}

/// Frame loop for one camera: classify each frame, debounce the target
/// class, report each confirmed violation with a fresh snapshot and location.
pub struct CameraSession {
    id: Uuid,
    target_class: String,
    classifier: Arc<dyn FrameClassifier>,
    location: Arc<dyn LocationProvider>,
    snapshots: Arc<dyn SnapshotSource>,
    sink: Arc<dyn ViolationSink>,
    debouncer: DetectionDebouncer,
    events: mpsc::Receiver<ViolationEvent>,
    frame_rate: FrameRate,
    summary: SessionSummary,
}

impl CameraSession {
    pub fn new(
        config: &DetectionConfig,
        classifier: Arc<dyn FrameClassifier>,
        location: Arc<dyn LocationProvider>,
        snapshots: Arc<dyn SnapshotSource>,
        sink: Arc<dyn ViolationSink>,
    ) -> Self {
        let id = Uuid::new_v4();
        let (tx, events) = mpsc::channel(8);
        let debouncer = DetectionDebouncer::new(
            id,
            Duration::from_millis(config.confirmation_window_ms),
            tx,
        );

        Self {
            id,
            target_class: config.target_class.clone(),
            classifier,
            location,
            snapshots,
            sink,
            debouncer,
            events,
            frame_rate: FrameRate::default(),
            summary: SessionSummary::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn fps(&self) -> Option<f64> {
        self.frame_rate.fps()
    }

    /// Classify one frame and feed the result to the debouncer. A frame the
    /// classifier fails on is skipped without touching the debouncer.
    pub async fn process_frame(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        self.summary.frames += 1;

        let detections = match self.classifier.classify(frame).await {
            Ok(detections) => detections,
            Err(e) => {
                self.summary.skipped_frames += 1;
                return Err(Error::Classifier(format!(
                    "Frame {} could not be classified: {}",
                    frame.sequence, e
                ))
                .into());
            }
        };

        self.debouncer
            .observe(frame_contains_class(&detections, &self.target_class));
        self.frame_rate.tick(Instant::now());

        Ok(detections)
    }

    /// Capture snapshot and location now, then report. Without a location
    /// fix the violation is dropped, not retried.
    pub async fn handle_event(&self, event: ViolationEvent) -> Result<ViolationRecord> {
        info!(
            "Session {}: violation confirmed at {}",
            self.id, event.triggered_at
        );

        let location = self.location.current_location().await.ok_or_else(|| {
            Error::LocationUnavailable("No location fix yet, violation not reported".to_string())
        })?;
        let image = self.snapshots.capture_snapshot().await?;

        self.sink
            .report(ViolationReport {
                location: Some(location),
                image,
            })
            .await
    }

    /// Drive the session until `frames` ends
    pub async fn run<S>(mut self, mut frames: S) -> SessionSummary
    where
        S: Stream<Item = Frame> + Unpin,
    {
        info!("Session {}: started", self.id);

        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    match self.handle_event(event).await {
                        Ok(record) => {
                            self.summary.violations_reported += 1;
                            info!("Session {}: reported violation {}", self.id, record.log_id);
                        }
                        Err(e) => {
                            self.summary.violations_dropped += 1;
                            error!("Session {}: violation not reported: {}", self.id, e);
                        }
                    }
                }
                frame = frames.next() => {
                    let Some(frame) = frame else { break };
                    if let Err(e) = self.process_frame(&frame).await {
                        warn!("Session {}: {}", self.id, e);
                    }
                    if let Some(fps) = self.fps() {
                        debug!("Session {}: {:.1} fps", self.id, fps);
                    }
                }
            }
        }

        info!(
            "Session {}: stopped after {} frames ({} violations reported)",
            self.id, self.summary.frames, self.summary.violations_reported
        );
        self.summary.clone()
    }
}
