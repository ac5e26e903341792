use crate::config::StorageConfig;
use crate::error::Error;
use anyhow::Result;
use log::info;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

pub mod models;
pub mod repositories;

use repositories::images::ImagesRepository;
use repositories::subscriptions::SubscriptionsRepository;
use repositories::violation_logs::ViolationLogsRepository;

/// File-backed storage: the violation log, the subscription list and the
/// image directory
pub struct StorageService {
    pub logs: Arc<ViolationLogsRepository>,
    pub subscriptions: Arc<SubscriptionsRepository>,
    pub images: Arc<ImagesRepository>,
}

impl StorageService {
    /// Open every store, creating empty ones on first run
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        info!("Initializing storage service");

        let logs = Arc::new(ViolationLogsRepository::new(&config.log_path));
        let subscriptions = Arc::new(SubscriptionsRepository::new(&config.subscriptions_path));
        let images = Arc::new(ImagesRepository::new(
            &config.image_dir,
            &config.image_route(),
        ));

        logs.bootstrap().await?;
        subscriptions.bootstrap().await?;
        images.bootstrap().await?;

        info!(
            "Storage ready (logs: {}, subscriptions: {}, images: {})",
            config.log_path.display(),
            config.subscriptions_path.display(),
            config.image_dir.display()
        );

        Ok(Self {
            logs,
            subscriptions,
            images,
        })
    }
}

/// Create `path` holding an empty JSON array unless it already exists
pub(crate) async fn ensure_json_array(path: &Path) -> Result<bool> {
    if tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::Io(format!("Failed to stat {}: {}", path.display(), e)))?
    {
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            Error::StorageWrite(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    write_json_atomic(path, &Vec::<serde_json::Value>::new()).await?;
    Ok(true)
}

/// Read a JSON array collection; an empty file reads as an empty collection
pub(crate) async fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;

    if data.trim().is_empty() {
        return Ok(Vec::new());
    }

    let items = serde_json::from_str::<Vec<T>>(&data).map_err(|e| {
        Error::CorruptStore(format!("Failed to parse {}: {}", path.display(), e))
    })?;

    Ok(items)
}

/// Replace `path` with the pretty-printed `value`: write a sibling temp
/// file, fsync it, then rename it over the target.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::Serialization(format!("Failed to serialize collection: {}", e)))?;

    let tmp_path = temp_sibling(path);
    let write_result = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&body).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(e) = write_result {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::StorageWrite(format!(
            "Failed to write {}: {}",
            path.display(),
            e
        ))
        .into());
    }

    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "collection".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_creates_every_store() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = StorageConfig {
            log_path: dir.path().join("db/HULECA-logs.json"),
            subscriptions_path: dir.path().join("db/subscriptions.json"),
            image_dir: dir.path().join("db/images"),
            image_base_path: "/images".to_string(),
        };

        let storage = StorageService::new(&config).await?;

        assert!(config.log_path.exists());
        assert!(config.subscriptions_path.exists());
        assert!(config.image_dir.is_dir());
        assert!(storage.logs.read_all().await?.is_empty());
        assert!(storage.subscriptions.list().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("items.json");

        write_json_atomic(&path, &vec![1, 2, 3]).await?;
        write_json_atomic(&path, &vec![4]).await?;

        let items: Vec<u32> = read_json_array(&path).await?;
        assert_eq!(items, vec![4]);
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn empty_file_reads_as_empty_collection() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("items.json");
        std::fs::write(&path, "  \n")?;

        let items: Vec<u32> = read_json_array(&path).await?;
        assert!(items.is_empty());
        Ok(())
    }
}
