use crate::config::NotificationConfig;
use crate::db::repositories::subscriptions::SubscriptionsRepository;
use crate::error::Error;
use crate::messaging::event::EventMessage;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    /// (endpoint, reason) for each failed delivery
    pub failures: Vec<(String, String)>,
}

/// Pushes events to registered subscribers. Delivery problems end up in the
/// report and the log, never in the caller's error path.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &EventMessage) -> DeliveryReport;
}

/// Notifier used when push delivery is disabled
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, event: &EventMessage) -> DeliveryReport {
        debug!("Notifications disabled, dropping event {}", event.id);
        DeliveryReport::default()
    }
}

/// POSTs each event as JSON to every registered endpoint
pub struct PushNotifier {
    subscriptions: Arc<SubscriptionsRepository>,
    client: reqwest::Client,
    config: NotificationConfig,
}

impl PushNotifier {
    pub fn new(
        subscriptions: Arc<SubscriptionsRepository>,
        config: NotificationConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::Notification(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            subscriptions,
            client,
            config,
        })
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    async fn notify(&self, event: &EventMessage) -> DeliveryReport {
        let subscriptions = match self.subscriptions.list().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!("Failed to load push subscriptions: {}", e);
                return DeliveryReport::default();
            }
        };

        let mut report = DeliveryReport {
            attempted: subscriptions.len(),
            ..DeliveryReport::default()
        };
        if subscriptions.is_empty() {
            debug!("No push subscribers for event {}", event.id);
            return report;
        }

        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let event = Arc::new(event.clone());
        let mut deliveries = JoinSet::new();

        for subscription in subscriptions {
            let permits = permits.clone();
            let client = self.client.clone();
            let event = event.clone();

            deliveries.spawn(async move {
                let endpoint = subscription.endpoint;
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (endpoint, Err(e.to_string())),
                };

                let outcome = match client.post(&endpoint).json(&*event).send().await {
                    Ok(response) => response
                        .error_for_status()
                        .map(|_| ())
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };
                (endpoint, outcome)
            });
        }

        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((_, Ok(()))) => report.delivered += 1,
                Ok((endpoint, Err(reason))) => {
                    warn!("Push delivery to {} failed: {}", endpoint, reason);
                    report.failures.push((endpoint, reason));
                }
                Err(e) => {
                    warn!("Push delivery task failed: {}", e);
                    report.failures.push((String::new(), e.to_string()));
                }
            }
        }

        info!(
            "Event {} pushed to {}/{} subscribers",
            event.event_type, report.delivered, report.attempted
        );
        report
    }
}
