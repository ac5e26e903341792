use crate::db::models::{format_log_time, NewViolation, TimeWindow, ViolationRecord};
use crate::db::{ensure_json_array, read_json_array, write_json_atomic};
use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Append-only violation log, persisted as one JSON array
pub struct ViolationLogsRepository {
    path: PathBuf,
    /// Serializes the read-compute-write append
    write_lock: Mutex<()>,
}

impl ViolationLogsRepository {
    /// Create a new violation log repository
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty log if none exists yet
    pub async fn bootstrap(&self) -> Result<()> {
        if ensure_json_array(&self.path).await? {
            info!("Created empty violation log at {}", self.path.display());
        }
        Ok(())
    }

    /// All records in logID order
    pub async fn read_all(&self) -> Result<Vec<ViolationRecord>> {
        read_json_array(&self.path).await
    }

    /// Append a record stamped with the current local time
    pub async fn append(&self, new: NewViolation) -> Result<ViolationRecord> {
        self.append_at(new, Local::now()).await
    }

    /// Append a record stamped with `at`; assigns `max(logID) + 1`
    pub async fn append_at(&self, new: NewViolation, at: DateTime<Local>) -> Result<ViolationRecord> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read_all().await?;
        let log_id = records.iter().map(|r| r.log_id).max().unwrap_or(0) + 1;

        let record = ViolationRecord {
            log_id,
            log_time: format_log_time(&at),
            log_location: new.location.to_string(),
            log_image_path: new.image_path,
        };
        records.push(record.clone());

        write_json_atomic(&self.path, &records).await?;
        debug!("Appended violation log {} ({} total)", log_id, records.len());

        Ok(record)
    }

    /// Records inside `window` relative to `now`; `None` returns everything.
    /// Entries whose logTime does not parse never match a window.
    pub async fn filter(
        &self,
        window: Option<TimeWindow>,
        now: NaiveDateTime,
    ) -> Result<Vec<ViolationRecord>> {
        let records = self.read_all().await?;
        Ok(match window {
            Some(window) => records
                .into_iter()
                .filter(|r| in_window(r, window, &now))
                .collect(),
            None => records,
        })
    }

    /// Number of records inside `window` relative to `now`
    pub async fn count_where(&self, window: Option<TimeWindow>, now: NaiveDateTime) -> Result<usize> {
        Ok(self.filter(window, now).await?.len())
    }
}

fn in_window(record: &ViolationRecord, window: TimeWindow, now: &NaiveDateTime) -> bool {
    record
        .captured_at()
        .map_or(false, |at| window.contains(&at, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::GeoLocation;
    use crate::error::Error;
    use chrono::{Duration, TimeZone};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn new_violation(n: u32) -> NewViolation {
        NewViolation {
            location: GeoLocation::new(14.5, 121.0).unwrap(),
            image_path: format!("/images/violation-{}.jpg", n),
        }
    }

    async fn repo(dir: &tempfile::TempDir) -> Result<ViolationLogsRepository> {
        let repo = ViolationLogsRepository::new(&dir.path().join("db/HULECA-logs.json"));
        repo.bootstrap().await?;
        Ok(repo)
    }

    #[tokio::test]
    async fn ids_start_at_one_and_append_is_last() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = repo(&dir).await?;

        let first = repo.append(new_violation(1)).await?;
        let second = repo.append(new_violation(2)).await?;
        assert_eq!(first.log_id, 1);
        assert_eq!(second.log_id, 2);

        let all = repo.read_all().await?;
        assert_eq!(all.last(), Some(&second));
        assert_eq!(all, repo.read_all().await?);
        Ok(())
    }

    #[tokio::test]
    async fn next_id_follows_the_maximum_existing_id() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = repo(&dir).await?;
        std::fs::write(
            repo.path(),
            r#"[{"logID": 41, "logTime": "x", "logLocation": "1.0, 2.0", "logImagePath": "/images/a.jpg"}]"#,
        )?;

        let record = repo.append(new_violation(1)).await?;
        assert_eq!(record.log_id, 42);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_get_distinct_consecutive_ids() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = Arc::new(repo(&dir).await?);

        let mut handles = Vec::new();
        for n in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.append(new_violation(n)).await }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await??.log_id);
        }

        assert_eq!(ids, (1..=32).collect::<HashSet<u64>>());
        let stored: Vec<u64> = repo.read_all().await?.iter().map(|r| r.log_id).collect();
        assert_eq!(stored, (1..=32).collect::<Vec<u64>>());
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_store_is_surfaced_and_left_untouched() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = repo(&dir).await?;
        std::fs::write(repo.path(), "{ not json")?;

        let err = repo.read_all().await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CorruptStore(_))));

        let err = repo.append(new_violation(1)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CorruptStore(_))));
        assert_eq!(std::fs::read_to_string(repo.path())?, "{ not json");
        Ok(())
    }

    #[tokio::test]
    async fn bootstrap_keeps_existing_log() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = repo(&dir).await?;
        repo.append(new_violation(1)).await?;

        repo.bootstrap().await?;
        assert_eq!(repo.read_all().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn daily_count_excludes_yesterday() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = repo(&dir).await?;

        let now = Local.with_ymd_and_hms(2026, 10, 18, 0, 30, 0).unwrap();
        repo.append_at(new_violation(1), now - Duration::hours(1)).await?;
        repo.append_at(new_violation(2), now).await?;
        repo.append_at(new_violation(3), now + Duration::hours(12)).await?;

        let now = now.naive_local();
        assert_eq!(repo.count_where(Some(TimeWindow::Daily), now).await?, 2);
        assert_eq!(repo.count_where(Some(TimeWindow::Yearly), now).await?, 3);
        assert_eq!(repo.count_where(None, now).await?, 3);

        let today = repo.filter(Some(TimeWindow::Daily), now).await?;
        assert_eq!(
            today.iter().map(|r| r.log_id).collect::<Vec<_>>(),
            vec![2, 3]
        );
        Ok(())
    }

    #[tokio::test]
    async fn unparseable_log_time_is_not_counted() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let repo = repo(&dir).await?;
        std::fs::write(
            repo.path(),
            r#"[{"logID": 1, "logTime": "sometime", "logLocation": "1.0, 2.0", "logImagePath": "/images/a.jpg"}]"#,
        )?;
        repo.append(new_violation(2)).await?;

        let now = Local::now().naive_local();
        assert_eq!(repo.count_where(Some(TimeWindow::Yearly), now).await?, 1);
        assert_eq!(repo.count_where(None, now).await?, 2);
        Ok(())
    }
}
