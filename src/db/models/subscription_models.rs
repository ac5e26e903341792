use serde::{Deserialize, Serialize};

/// Browser push subscription, as produced by `PushSubscription.toJSON()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default)]
    pub expiration_time: Option<f64>,
    #[serde(default)]
    pub keys: Option<SubscriptionKeys>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

impl PushSubscription {
    /// Subscriptions are the same subscriber when their endpoints match
    pub fn same_endpoint(&self, other: &PushSubscription) -> bool {
        self.endpoint == other.endpoint
    }
}
