use ryde_core::push::{PushError, PushGateway, PushMessage};
use ryde_core::repository::PushSubscriptionRepository;
use ryde_domain::{PushSubscription, SubscriptionKeys};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dispatcher::NotifyError;

const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(3);

/// Manages the device opt-in lifecycle and out-of-band delivery. Permission
/// is granted in the user agent; this side only ever sees the subscription
/// material the agent produced.
pub struct PushSubscriptionManager {
    store: Arc<dyn PushSubscriptionRepository>,
    gateway: Arc<dyn PushGateway>,
    send_timeout: Duration,
}

impl PushSubscriptionManager {
    pub fn new(store: Arc<dyn PushSubscriptionRepository>, gateway: Arc<dyn PushGateway>) -> Self {
        Self {
            store,
            gateway,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Store a device registration. Re-subscription replaces the prior
    /// record for the user.
    pub async fn subscribe(
        &self,
        user_id: Uuid,
        endpoint: String,
        keys: SubscriptionKeys,
    ) -> Result<PushSubscription, NotifyError> {
        let subscription = PushSubscription::new(user_id, endpoint, keys);
        self.store
            .upsert(&subscription)
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))?;
        info!(%user_id, "push subscription stored");
        Ok(subscription)
    }

    /// Deregister with the remote service (best effort) and remove the
    /// local record regardless of the remote result.
    pub async fn unsubscribe(&self, user_id: Uuid) -> Result<(), NotifyError> {
        let existing = self
            .store
            .get(user_id)
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))?;

        if let Some(subscription) = existing {
            match tokio::time::timeout(self.send_timeout, self.gateway.unregister(&subscription))
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%user_id, error = %e, "remote push deregistration failed"),
                Err(_) => warn!(%user_id, "remote push deregistration timed out"),
            }
        }

        self.store
            .remove(user_id)
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))?;
        info!(%user_id, "push subscription removed");
        Ok(())
    }

    pub async fn subscribed_user_ids(&self) -> Result<Vec<Uuid>, NotifyError> {
        self.store
            .user_ids()
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))
    }

    /// Best-effort out-of-band delivery for a user with no live connection.
    /// No subscription is a no-op: the durable notification copy already
    /// exists, so nothing here may fail the dispatch.
    pub async fn send_to_user(&self, user_id: Uuid, message: &PushMessage) {
        let subscription = match self.store.get(user_id).await {
            Ok(Some(subscription)) => subscription,
            Ok(None) => return,
            Err(e) => {
                warn!(%user_id, error = %e, "push subscription lookup failed");
                return;
            }
        };

        match tokio::time::timeout(self.send_timeout, self.gateway.send(&subscription, message))
            .await
        {
            Ok(Ok(())) => debug!(%user_id, "push delivered"),
            Ok(Err(PushError::SubscriptionInvalid)) => {
                info!(%user_id, "push subscription no longer valid, removing");
                if let Err(e) = self.store.remove(user_id).await {
                    warn!(%user_id, error = %e, "failed to remove stale push subscription");
                }
            }
            Ok(Err(e)) => warn!(%user_id, error = %e, "push delivery failed"),
            Err(_) => warn!(%user_id, "push delivery timed out"),
        }
    }
}
