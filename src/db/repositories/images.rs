use crate::error::Error;
use anyhow::Result;
use chrono::{DateTime, Local};
use log::debug;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Literal prefix of every stored violation image
pub const IMAGE_PREFIX: &str = "violation-";

/// A snapshot written to the image directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub file_name: String,
    /// Location on disk
    pub file_path: PathBuf,
    /// Path the image is served under, as referenced by the log
    pub url_path: String,
}

/// Directory of violation snapshots, one file per violation
pub struct ImagesRepository {
    dir: PathBuf,
    base_path: String,
}

impl ImagesRepository {
    pub fn new(dir: &Path, base_path: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            base_path: base_path.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub async fn bootstrap(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::StorageWrite(format!(
                "Failed to create image directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Write `bytes` under a fresh name derived from `at`. The random suffix
    /// keeps same-second snapshots apart; `create_new` refuses to overwrite.
    pub async fn save(&self, bytes: &[u8], at: DateTime<Local>) -> Result<StoredImage> {
        let file_name = format!(
            "{}{}-{}.{}",
            IMAGE_PREFIX,
            at.format("%Y%m%d-%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8],
            image_extension(bytes)
        );
        let file_path = self.dir.join(&file_name);

        let write_result = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&file_path)
                .await?;
            file.write_all(bytes).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = write_result {
            return Err(Error::StorageWrite(format!(
                "Failed to write image {}: {}",
                file_path.display(),
                e
            ))
            .into());
        }

        debug!("Stored {} byte image at {}", bytes.len(), file_path.display());

        Ok(StoredImage {
            url_path: format!("{}/{}", self.base_path, file_name),
            file_name,
            file_path,
        })
    }

    /// Map a served path back to the file on disk
    pub fn resolve(&self, url_path: &str) -> Option<PathBuf> {
        let name = url_path.strip_prefix(&self.base_path)?.strip_prefix('/')?;
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return None;
        }
        Some(self.dir.join(name))
    }
}

/// File extension matching the encoded image, JPEG unless the magic says otherwise
fn image_extension(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
        "webp"
    } else {
        "jpg"
    }
}
