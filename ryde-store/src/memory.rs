use async_trait::async_trait;
use ryde_core::repository::{
    BookingRepository, NotificationRepository, PushSubscriptionRepository, StoreResult,
};
use ryde_domain::{Booking, Notification, PushSubscription};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory booking store. The default wiring for the single-process
/// deployment and the store the test suites run against.
pub struct MemoryBookingStore {
    rows: RwLock<HashMap<Uuid, Booking>>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingRepository for MemoryBookingStore {
    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        rows.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).cloned())
    }

    async fn update(&self, booking: &Booking) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        if !rows.contains_key(&booking.id) {
            return Err(format!("booking not found: {}", booking.id).into());
        }
        rows.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn list_for_car(&self, car_id: Uuid, active_only: bool) -> StoreResult<Vec<Booking>> {
        let rows = self.rows.read().await;
        let mut out: Vec<Booking> = rows
            .values()
            .filter(|b| b.car_id == car_id)
            .filter(|b| !active_only || b.blocks_availability())
            .cloned()
            .collect();
        out.sort_by_key(|b| b.pickup());
        Ok(out)
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = self.rows.read().await;
        let mut out: Vec<Booking> = rows
            .values()
            .filter(|b| b.renter_id == user_id || b.owner_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }
}

/// In-memory per-user notification log.
pub struct MemoryNotificationStore {
    rows: RwLock<HashMap<Uuid, Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        rows.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Notification>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&id).cloned())
    }

    async fn set_read(&self, id: Uuid) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(notification) => {
                notification.mark_read();
                Ok(())
            }
            None => Err(format!("notification not found: {}", id).into()),
        }
    }

    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let rows = self.rows.read().await;
        let mut out: Vec<Notification> = rows
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn unread_count(&self, user_id: Uuid) -> StoreResult<u64> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as u64)
    }
}

/// In-memory push-subscription records, one per user.
pub struct MemoryPushSubscriptionStore {
    rows: RwLock<HashMap<Uuid, PushSubscription>>,
}

impl MemoryPushSubscriptionStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryPushSubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushSubscriptionRepository for MemoryPushSubscriptionStore {
    async fn upsert(&self, subscription: &PushSubscription) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        rows.insert(subscription.user_id, subscription.clone());
        Ok(())
    }

    async fn get(&self, user_id: Uuid) -> StoreResult<Option<PushSubscription>> {
        let rows = self.rows.read().await;
        Ok(rows.get(&user_id).cloned())
    }

    async fn remove(&self, user_id: Uuid) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        rows.remove(&user_id);
        Ok(())
    }

    async fn user_ids(&self) -> StoreResult<Vec<Uuid>> {
        let rows = self.rows.read().await;
        Ok(rows.keys().copied().collect())
    }
}
