use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key material handed back by the user agent when the device opted in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionKeys {
    pub p256dh: String,
    pub auth: String,
}

/// A device's registration to receive pushes while no live connection is
/// open. One record per user; re-subscription replaces the prior record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub user_id: Uuid,
    pub endpoint: String,
    pub keys: SubscriptionKeys,
    pub created_at: DateTime<Utc>,
}

impl PushSubscription {
    pub fn new(user_id: Uuid, endpoint: String, keys: SubscriptionKeys) -> Self {
        Self {
            user_id,
            endpoint,
            keys,
            created_at: Utc::now(),
        }
    }
}
