use anyhow::Result;
use huleca::api::rest::{AppState, RestApi};
use huleca::config::{self, CONFIG_ENV_VAR};
use huleca::messaging::{EventMessage, EventType, NoopNotifier, Notifier, PushNotifier};
use huleca::{StorageService, ViolationRecorder};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;

async fn announce(notifier: &dyn Notifier, event_type: EventType, message: &str) {
    match EventMessage::new(
        event_type.clone(),
        None,
        message,
        serde_json::json!({ "timestamp": chrono::Utc::now().to_rfc3339() }),
    ) {
        Ok(event) => {
            notifier.notify(&event).await;
        }
        Err(e) => warn!("Failed to build {} event: {}", event_type, e),
    }
}

async fn run_app() -> Result<()> {
    let config_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.api.log_level.as_str()),
    )
    .init();
    info!("Starting HULECA violation log service");
    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No {} set, using default configuration", CONFIG_ENV_VAR),
    }

    let storage = StorageService::new(&config.storage).await?;

    let notifier: Arc<dyn Notifier> = if config.notifications.enabled {
        Arc::new(PushNotifier::new(
            storage.subscriptions.clone(),
            config.notifications.clone(),
        )?)
    } else {
        info!("Push notifications disabled");
        Arc::new(NoopNotifier)
    };

    let recorder = Arc::new(ViolationRecorder::new(
        storage.logs.clone(),
        storage.images.clone(),
        notifier.clone(),
    ));

    let http_server = RestApi::new(
        &config,
        AppState {
            recorder,
            logs: storage.logs.clone(),
            subscriptions: storage.subscriptions.clone(),
        },
    )?;

    announce(notifier.as_ref(), EventType::SystemStartup, "HULECA is online").await;

    http_server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down...");
        })
        .await?;

    announce(
        notifier.as_ref(),
        EventType::SystemShutdown,
        "HULECA is shutting down",
    )
    .await;

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run_app().await {
        eprintln!("Application error: {:#}", e);
        std::process::exit(1);
    }
}
