use async_trait::async_trait;
use ryde_domain::PushSubscription;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

/// Payload handed to the push-delivery service. Encoding on the wire is the
/// collaborator's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The subscription is expired or revoked; the local record should be
    /// dropped so we stop retrying it.
    #[error("push subscription is no longer valid")]
    SubscriptionInvalid,

    #[error("push delivery failed: {0}")]
    Delivery(String),
}

/// Contract with the browser/device push-delivery service.
#[async_trait]
pub trait PushGateway: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Result<(), PushError>;

    /// Deregister with the remote service. Best-effort: callers remove the
    /// local record whether or not this succeeds.
    async fn unregister(&self, subscription: &PushSubscription) -> Result<(), PushError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockMode {
    Deliver,
    Invalid,
    Unreachable,
}

pub struct MockPushGateway {
    mode: MockMode,
    sent: Mutex<Vec<(Uuid, PushMessage)>>,
    unregistered: Mutex<Vec<Uuid>>,
}

impl MockPushGateway {
    pub fn new() -> Self {
        Self {
            mode: MockMode::Deliver,
            sent: Mutex::new(Vec::new()),
            unregistered: Mutex::new(Vec::new()),
        }
    }

    /// Every send reports the subscription as invalid.
    pub fn invalid() -> Self {
        Self {
            mode: MockMode::Invalid,
            ..Self::new()
        }
    }

    /// Every call fails with a transport error.
    pub fn unreachable() -> Self {
        Self {
            mode: MockMode::Unreachable,
            ..Self::new()
        }
    }

    pub fn sent(&self) -> Vec<(Uuid, PushMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn unregistered(&self) -> Vec<Uuid> {
        self.unregistered.lock().unwrap().clone()
    }
}

impl Default for MockPushGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushGateway for MockPushGateway {
    async fn send(
        &self,
        subscription: &PushSubscription,
        message: &PushMessage,
    ) -> Result<(), PushError> {
        match self.mode {
            MockMode::Deliver => {
                self.sent
                    .lock()
                    .unwrap()
                    .push((subscription.user_id, message.clone()));
                Ok(())
            }
            MockMode::Invalid => Err(PushError::SubscriptionInvalid),
            MockMode::Unreachable => Err(PushError::Delivery("gateway unreachable".into())),
        }
    }

    async fn unregister(&self, subscription: &PushSubscription) -> Result<(), PushError> {
        if self.mode == MockMode::Unreachable {
            return Err(PushError::Delivery("gateway unreachable".into()));
        }
        self.unregistered.lock().unwrap().push(subscription.user_id);
        Ok(())
    }
}
