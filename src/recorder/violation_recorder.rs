use crate::db::models::{GeoLocation, NewViolation, ViolationRecord};
use crate::db::repositories::images::ImagesRepository;
use crate::db::repositories::violation_logs::ViolationLogsRepository;
use crate::error::Error;
use crate::messaging::{EventMessage, Notifier};
use anyhow::Result;
use chrono::Local;
use log::{error, info, warn};
use std::sync::Arc;

/// A confirmed violation as it reaches the recorder: a snapshot taken at
/// confirmation time and wherever the camera was then
#[derive(Debug, Clone)]
pub struct ViolationReport {
    pub location: Option<GeoLocation>,
    pub image: Vec<u8>,
}

/// Turns violation reports into a stored image plus one appended log record
pub struct ViolationRecorder {
    logs: Arc<ViolationLogsRepository>,
    images: Arc<ImagesRepository>,
    notifier: Arc<dyn Notifier>,
}

impl ViolationRecorder {
    /// Create a new violation recorder
    pub fn new(
        logs: Arc<ViolationLogsRepository>,
        images: Arc<ImagesRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            logs,
            images,
            notifier,
        }
    }

    /// Persist one violation. Every call appends a new record; nothing is
    /// deduplicated.
    pub async fn record(&self, report: ViolationReport) -> Result<ViolationRecord> {
        let location = report.location.ok_or_else(|| {
            Error::LocationUnavailable("Location is required to report a violation".to_string())
        })?;
        if report.image.is_empty() {
            return Err(Error::Validation("Violation image is empty".to_string()).into());
        }

        let stored = self.images.save(&report.image, Local::now()).await?;

        let record = match self
            .logs
            .append(NewViolation {
                location,
                image_path: stored.url_path.clone(),
            })
            .await
        {
            Ok(record) => record,
            Err(e) => {
                // No rollback: the file stays behind for later reconciliation.
                warn!(
                    "Orphaned violation image {} (log append failed: {})",
                    stored.file_path.display(),
                    e
                );
                return Err(match e.downcast::<Error>() {
                    Ok(err @ Error::CorruptStore(_)) | Ok(err @ Error::StorageWrite(_)) => err.into(),
                    Ok(other) => Error::StorageWrite(other.to_string()).into(),
                    Err(e) => Error::StorageWrite(e.to_string()).into(),
                });
            }
        };

        info!(
            "Recorded violation {} at {} ({})",
            record.log_id, record.log_location, record.log_image_path
        );

        self.spawn_notification(&record);

        Ok(record)
    }

    fn spawn_notification(&self, record: &ViolationRecord) {
        let event = match EventMessage::violation_recorded(record) {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to build notification for violation {}: {}", record.log_id, e);
                return;
            }
        };

        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            let report = notifier.notify(&event).await;
            if !report.failures.is_empty() {
                warn!(
                    "{} of {} push deliveries failed for event {}",
                    report.failures.len(),
                    report.attempted,
                    event.id
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::DeliveryReport;
    use async_trait::async_trait;
    use chrono::Datelike;
    use std::path::Path;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// 10x10 black baseline JPEG
    const BLACK_JPEG: &[u8] = &[
        0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0x4a, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x00, 0x00,
        0x01, 0x00, 0x01, 0x00, 0x00, 0xff, 0xdb, 0x00, 0x43, 0x00, 0x08, 0x06, 0x06, 0x07, 0x06,
        0x05, 0x08, 0x07, 0x07, 0x07, 0x09, 0x09, 0x08, 0x0a, 0x0c, 0x14, 0x0d, 0x0c, 0x0b, 0x0b,
        0x0c, 0x19, 0x12, 0x13, 0x0f, 0x14, 0x1d, 0x1a, 0x1f, 0x1e, 0x1d, 0x1a, 0x1c, 0x1c, 0x20,
        0x24, 0x2e, 0x27, 0x20, 0x22, 0x2c, 0x23, 0x1c, 0x1c, 0x28, 0x37, 0x29, 0x2c, 0x30, 0x31,
        0x34, 0x34, 0x34, 0x1f, 0x27, 0x39, 0x3d, 0x38, 0x32, 0x3c, 0x2e, 0x33, 0x34, 0x32, 0xff,
        0xc0, 0x00, 0x0b, 0x08, 0x00, 0x0a, 0x00, 0x0a, 0x01, 0x01, 0x11, 0x00, 0xff, 0xc4, 0x00,
        0x14, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x09, 0xff, 0xc4, 0x00, 0x14, 0x10, 0x01, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0xda, 0x00,
        0x08, 0x01, 0x01, 0x00, 0x00, 0x3f, 0x00, 0x2a, 0x9f, 0xff, 0xd9,
    ];

    struct ChannelNotifier(mpsc::UnboundedSender<EventMessage>);

    #[async_trait]
    impl Notifier for ChannelNotifier {
        async fn notify(&self, event: &EventMessage) -> DeliveryReport {
            let _ = self.0.send(event.clone());
            DeliveryReport::default()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        logs: Arc<ViolationLogsRepository>,
        images: Arc<ImagesRepository>,
        recorder: ViolationRecorder,
        notified: mpsc::UnboundedReceiver<EventMessage>,
    }

    async fn fixture_with_image_dir(image_dir: Option<&Path>) -> Result<Fixture> {
        let dir = tempfile::tempdir()?;
        let logs = Arc::new(ViolationLogsRepository::new(&dir.path().join("logs.json")));
        logs.bootstrap().await?;

        let images = match image_dir {
            Some(path) => Arc::new(ImagesRepository::new(path, "/images")),
            None => {
                let images = Arc::new(ImagesRepository::new(&dir.path().join("images"), "/images"));
                images.bootstrap().await?;
                images
            }
        };

        let (tx, notified) = mpsc::unbounded_channel();
        let recorder = ViolationRecorder::new(logs.clone(), images.clone(), Arc::new(ChannelNotifier(tx)));

        Ok(Fixture {
            _dir: dir,
            logs,
            images,
            recorder,
            notified,
        })
    }

    fn image_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn first_violation_in_empty_store() -> Result<()> {
        let mut fx = fixture_with_image_dir(None).await?;

        let record = fx
            .recorder
            .record(ViolationReport {
                location: Some("14.5, 121.0".parse()?),
                image: BLACK_JPEG.to_vec(),
            })
            .await?;

        assert_eq!(record.log_id, 1);
        assert_eq!(record.log_location, "14.5, 121.0");
        assert!(record.log_image_path.starts_with("/images/violation-"));
        assert_eq!(fx.logs.read_all().await?, vec![record.clone()]);

        let now = Local::now().naive_local();
        let yearly = fx
            .logs
            .count_where(Some(crate::db::models::TimeWindow::Yearly), now)
            .await?;
        // Skipped when the run straddles New Year.
        if record.captured_at().map(|at| at.year()) == Some(now.year()) {
            assert_eq!(yearly, 1);
        }

        let stored = fx.images.resolve(&record.log_image_path).unwrap();
        assert_eq!(std::fs::read(stored)?, BLACK_JPEG);

        let event = tokio::time::timeout(Duration::from_secs(1), fx.notified.recv())
            .await?
            .expect("notification");
        assert_eq!(event.payload["logID"], 1);
        assert!(event.message.contains("14.5, 121.0"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_location_writes_nothing() -> Result<()> {
        let fx = fixture_with_image_dir(None).await?;

        let err = fx
            .recorder
            .record(ViolationReport {
                location: None,
                image: BLACK_JPEG.to_vec(),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::LocationUnavailable(_))
        ));
        assert!(fx.logs.read_all().await?.is_empty());
        assert_eq!(image_count(fx.images.dir()), 0);
        Ok(())
    }

    #[tokio::test]
    async fn empty_image_is_a_validation_error() -> Result<()> {
        let fx = fixture_with_image_dir(None).await?;

        let err = fx
            .recorder
            .record(ViolationReport {
                location: Some(GeoLocation::new(1.0, 2.0)?),
                image: Vec::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Validation(_))));
        assert!(fx.logs.read_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn image_write_failure_skips_the_log_append() -> Result<()> {
        let blocker = tempfile::NamedTempFile::new()?;
        let mut fx = fixture_with_image_dir(Some(blocker.path())).await?;

        let err = fx
            .recorder
            .record(ViolationReport {
                location: Some(GeoLocation::new(1.0, 2.0)?),
                image: BLACK_JPEG.to_vec(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::StorageWrite(_))));
        assert!(fx.logs.read_all().await?.is_empty());
        assert!(fx.notified.try_recv().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_log_orphans_the_image_and_surfaces() -> Result<()> {
        let fx = fixture_with_image_dir(None).await?;
        std::fs::write(fx.logs.path(), "[{")?;

        let err = fx
            .recorder
            .record(ViolationReport {
                location: Some(GeoLocation::new(1.0, 2.0)?),
                image: BLACK_JPEG.to_vec(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CorruptStore(_))));
        assert_eq!(std::fs::read_to_string(fx.logs.path())?, "[{");
        assert_eq!(image_count(fx.images.dir()), 1);
        Ok(())
    }

    #[tokio::test]
    async fn identical_reports_are_not_merged() -> Result<()> {
        let fx = fixture_with_image_dir(None).await?;
        let report = ViolationReport {
            location: Some(GeoLocation::new(1.0, 2.0)?),
            image: BLACK_JPEG.to_vec(),
        };

        let a = fx.recorder.record(report.clone()).await?;
        let b = fx.recorder.record(report).await?;

        assert_eq!((a.log_id, b.log_id), (1, 2));
        assert_ne!(a.log_image_path, b.log_image_path);
        assert_eq!(image_count(fx.images.dir()), 2);
        Ok(())
    }
}
