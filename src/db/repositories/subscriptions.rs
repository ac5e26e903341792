use crate::db::models::PushSubscription;
use crate::db::{ensure_json_array, read_json_array, write_json_atomic};
use crate::error::Error;
use anyhow::Result;
use log::info;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Registered push endpoints, deduplicated by endpoint
pub struct SubscriptionsRepository {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SubscriptionsRepository {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn bootstrap(&self) -> Result<()> {
        if ensure_json_array(&self.path).await? {
            info!("Created empty subscription list at {}", self.path.display());
        }
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<PushSubscription>> {
        read_json_array(&self.path).await
    }

    /// Persist `subscription` unless its endpoint is already registered.
    /// Returns whether it was added.
    pub async fn register(&self, subscription: PushSubscription) -> Result<bool> {
        if subscription.endpoint.trim().is_empty() {
            return Err(Error::Validation("Subscription endpoint is required".to_string()).into());
        }

        let _guard = self.write_lock.lock().await;

        let mut subscriptions = self.list().await?;
        if subscriptions.iter().any(|s| s.same_endpoint(&subscription)) {
            return Ok(false);
        }

        info!("Registering push subscription for {}", subscription.endpoint);
        subscriptions.push(subscription);
        write_json_atomic(&self.path, &subscriptions).await?;

        Ok(true)
    }
}
