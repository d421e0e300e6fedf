use ryde_domain::Notification;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Handle for pushing payloads to one live connection. Sends never block;
/// the receiving side is the connection's outbound stream.
pub type LiveSender = mpsc::UnboundedSender<Notification>;

/// Tracks which authenticated users currently have a live channel open.
/// An injected, explicitly-owned instance: created at process start, held
/// by the app state. Nothing here is persisted; a restart clears all state
/// and clients re-authenticate on reconnect.
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// user -> (connection id -> sender); a user may hold several
    /// simultaneous connections (tabs, devices).
    by_user: HashMap<Uuid, HashMap<Uuid, LiveSender>>,
    /// connection id -> owning user, for disconnects.
    owners: HashMap<Uuid, Uuid>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Register a live connection for an already-verified user id.
    pub async fn authenticate(&self, connection_id: Uuid, user_id: Uuid, sender: LiveSender) {
        let mut inner = self.inner.write().await;
        inner.owners.insert(connection_id, user_id);
        inner
            .by_user
            .entry(user_id)
            .or_default()
            .insert(connection_id, sender);
        debug!(%connection_id, %user_id, "connection registered");
    }

    /// Remove exactly this connection. Unknown ids are a no-op.
    pub async fn disconnect(&self, connection_id: Uuid) {
        let mut inner = self.inner.write().await;
        let Some(user_id) = inner.owners.remove(&connection_id) else {
            return;
        };
        let now_empty = match inner.by_user.get_mut(&user_id) {
            Some(conns) => {
                conns.remove(&connection_id);
                conns.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.by_user.remove(&user_id);
        }
        debug!(%connection_id, %user_id, "connection removed");
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        let inner = self.inner.read().await;
        inner.by_user.get(&user_id).is_some_and(|c| !c.is_empty())
    }

    /// Live senders for a user, for fan-out to all of their open sessions.
    pub async fn connections_for(&self, user_id: Uuid) -> Vec<LiveSender> {
        let inner = self.inner.read().await;
        inner
            .by_user
            .get(&user_id)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Push a payload to every connection of its recipient. Fire-and-forget
    /// per connection: one dead channel must not block the others. Returns
    /// how many connections accepted the payload.
    pub async fn publish(&self, notification: &Notification) -> usize {
        let mut delivered = 0;
        for sender in self.connections_for(notification.user_id).await {
            match sender.send(notification.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    // receiver already dropped; the connection guard will
                    // deregister it shortly
                    debug!(user_id = %notification.user_id, "skipped closed connection");
                }
            }
        }
        delivered
    }

    pub async fn online_users(&self) -> Vec<Uuid> {
        let inner = self.inner.read().await;
        inner.by_user.keys().copied().collect()
    }

    pub async fn connection_count(&self, user_id: Uuid) -> usize {
        let inner = self.inner.read().await;
        inner.by_user.get(&user_id).map_or(0, |c| c.len())
    }

    pub async fn total_connections(&self) -> usize {
        let inner = self.inner.read().await;
        inner.by_user.values().map(|c| c.len()).sum()
    }

    /// Drop every connection, e.g. on shutdown.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.by_user.clear();
        inner.owners.clear();
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
