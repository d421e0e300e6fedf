use ryde_booking::BookingManager;
use ryde_core::payment::PaymentAdapter;
use ryde_notify::{ConnectionRegistry, NotificationDispatcher, PushSubscriptionManager};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingManager>,
    pub notifier: Arc<NotificationDispatcher>,
    pub registry: Arc<ConnectionRegistry>,
    pub subscriptions: Arc<PushSubscriptionManager>,
    pub payments: Arc<dyn PaymentAdapter>,
    pub auth: AuthConfig,
}
