use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "HULECA_CONFIG";

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// API server address
    #[serde(default = "default_address")]
    pub address: String,
    /// API server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Maximum accepted request body, in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// On-disk layout of the log collection, subscriptions and images
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Violation log collection (JSON array)
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Push subscription collection (JSON array)
    #[serde(default = "default_subscriptions_path")]
    pub subscriptions_path: PathBuf,
    /// Directory holding one image per violation
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    /// URL path the image directory is served under
    #[serde(default = "default_image_base_path")]
    pub image_base_path: String,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("./db/HULECA-logs.json")
}

fn default_subscriptions_path() -> PathBuf {
    PathBuf::from("./db/subscriptions.json")
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("./db/images")
}

fn default_image_base_path() -> String {
    "/images".to_string()
}

/// Detection pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectionConfig {
    /// Class name that counts as a violation (case-insensitive)
    #[serde(default = "default_target_class")]
    pub target_class: String,
    /// Presence must hold this long before a violation is confirmed
    #[serde(default = "default_confirmation_window_ms")]
    pub confirmation_window_ms: u64,
}

fn default_target_class() -> String {
    "cigarette".to_string()
}

fn default_confirmation_window_ms() -> u64 {
    3000
}

/// Push notification fan-out configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Whether violations are pushed to subscribers
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    /// Maximum deliveries in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Per-delivery timeout in milliseconds
    #[serde(default = "default_notification_timeout")]
    pub timeout_ms: u64,
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    8
}

fn default_notification_timeout() -> u64 {
    5000 // 5 seconds
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            log_level: default_log_level(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl StorageConfig {
    /// `image_base_path` as a route: one leading slash, no trailing slash
    pub fn image_route(&self) -> String {
        format!("/{}", self.image_base_path.trim_matches('/'))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            subscriptions_path: default_subscriptions_path(),
            image_dir: default_image_dir(),
            image_base_path: default_image_base_path(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            target_class: default_target_class(),
            confirmation_window_ms: default_confirmation_window_ms(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            max_concurrency: default_max_concurrency(),
            timeout_ms: default_notification_timeout(),
        }
    }
}

/// Load configuration from a file or use default
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => {
            let config_str = std::fs::read_to_string(path)
                .context(format!("Failed to read config file: {:?}", path))?;

            let config = if path.extension().map_or(false, |ext| ext == "json") {
                serde_json::from_str(&config_str).context("Failed to parse JSON config")?
            } else if path.extension().map_or(false, |ext| ext == "toml") {
                toml::from_str(&config_str).context("Failed to parse TOML config")?
            } else {
                return Err(anyhow::anyhow!("Unsupported config file format"));
            };

            Ok(config)
        }
        None => Ok(Config::default()),
    }
}
