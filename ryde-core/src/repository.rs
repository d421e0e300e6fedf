use async_trait::async_trait;
use ryde_domain::{Booking, Notification, PushSubscription};
use uuid::Uuid;

pub type StoreResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Repository trait for booking data access. The overlap invariant itself
/// lives in the booking manager; the store only answers queries and writes.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: &Booking) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn update(&self, booking: &Booking) -> StoreResult<()>;

    /// Bookings for a car; `active_only` filters out cancelled ones.
    async fn list_for_car(&self, car_id: Uuid, active_only: bool) -> StoreResult<Vec<Booking>>;

    /// Bookings where the user is either the renter or the car owner.
    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;
}

/// Repository trait for the per-user notification log.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Notification>>;

    async fn set_read(&self, id: Uuid) -> StoreResult<()>;

    /// Newest first.
    async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;

    async fn unread_count(&self, user_id: Uuid) -> StoreResult<u64>;
}

/// Repository trait for push-subscription records.
#[async_trait]
pub trait PushSubscriptionRepository: Send + Sync {
    /// Insert or replace the record for the subscription's user.
    async fn upsert(&self, subscription: &PushSubscription) -> StoreResult<()>;

    async fn get(&self, user_id: Uuid) -> StoreResult<Option<PushSubscription>>;

    async fn remove(&self, user_id: Uuid) -> StoreResult<()>;

    async fn user_ids(&self) -> StoreResult<Vec<Uuid>>;
}
