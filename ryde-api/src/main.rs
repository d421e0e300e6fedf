use ryde_api::{
    app,
    state::{AppState, AuthConfig},
};
use ryde_booking::BookingManager;
use ryde_core::payment::{MockPaymentAdapter, PaymentAdapter};
use ryde_core::push::{MockPushGateway, PushGateway};
use ryde_core::repository::{BookingRepository, NotificationRepository, PushSubscriptionRepository};
use ryde_notify::{ConnectionRegistry, NotificationDispatcher, PushSubscriptionManager};
use ryde_store::{
    Db, MemoryBookingStore, MemoryNotificationStore, MemoryPushSubscriptionStore, PgBookingStore,
    PgNotificationStore, PgPushSubscriptionStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ryde_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ryde_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Ryde API on port {}", config.server.port);

    // Stores: Postgres when configured, in-memory otherwise
    let (booking_store, notification_store, subscription_store): (
        Arc<dyn BookingRepository>,
        Arc<dyn NotificationRepository>,
        Arc<dyn PushSubscriptionRepository>,
    ) = if config.database.url.is_empty() {
        tracing::info!("no database configured, using in-memory stores");
        (
            Arc::new(MemoryBookingStore::new()),
            Arc::new(MemoryNotificationStore::new()),
            Arc::new(MemoryPushSubscriptionStore::new()),
        )
    } else {
        let db = Db::connect(&config.database.url)
            .await
            .expect("Failed to connect to database");
        (
            Arc::new(PgBookingStore::new(db.pool.clone())),
            Arc::new(PgNotificationStore::new(db.pool.clone())),
            Arc::new(PgPushSubscriptionStore::new(db.pool.clone())),
        )
    };

    // Connection registry lives for the process; cleared by restart
    let registry = Arc::new(ConnectionRegistry::new());

    // External collaborators. Real gateways slot in behind these traits.
    let payments: Arc<dyn PaymentAdapter> = Arc::new(MockPaymentAdapter::new());
    let push_gateway: Arc<dyn PushGateway> = Arc::new(MockPushGateway::new());

    let subscriptions = Arc::new(
        PushSubscriptionManager::new(subscription_store, push_gateway).with_send_timeout(
            Duration::from_millis(config.business_rules.push_send_timeout_ms),
        ),
    );

    let notifier = Arc::new(NotificationDispatcher::new(
        notification_store,
        registry.clone(),
        subscriptions.clone(),
    ));

    let bookings = Arc::new(
        BookingManager::new(booking_store, payments.clone(), notifier.clone())
            .with_lock_wait(Duration::from_millis(config.business_rules.booking_lock_wait_ms)),
    );

    let app_state = AppState {
        bookings,
        notifier,
        registry,
        subscriptions,
        payments,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
