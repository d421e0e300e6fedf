use async_trait::async_trait;
use ryde_core::events::EventSink;
use ryde_core::push::PushMessage;
use ryde_core::repository::NotificationRepository;
use ryde_domain::{Booking, DomainEvent, Notification, NotificationKind, Priority};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::push::PushSubscriptionManager;
use crate::registry::ConnectionRegistry;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("not allowed to act on this notification")]
    Authorization,

    #[error("notification not found: {0}")]
    NotFound(Uuid),

    #[error("unknown event type: {0}")]
    UnknownEvent(String),

    #[error("store error: {0}")]
    Persistence(String),
}

/// One recipient's rendering of a domain event, before it becomes a stored
/// notification.
struct Draft {
    user_id: Uuid,
    kind: NotificationKind,
    title: &'static str,
    message: String,
    priority: Priority,
    data: serde_json::Value,
}

fn booking_data(booking: &Booking) -> serde_json::Value {
    json!({
        "booking_id": booking.id,
        "car_id": booking.car_id,
        "start_date": booking.start_date,
        "end_date": booking.end_date,
    })
}

/// Fixed per-event templates. The match is exhaustive: a new event variant
/// will not compile until it gets a template.
fn drafts_for(event: &DomainEvent) -> Vec<Draft> {
    match event {
        DomainEvent::BookingRequested { booking } => vec![Draft {
            user_id: booking.owner_id,
            kind: NotificationKind::BookingRequested,
            title: "New booking request",
            message: format!(
                "Your car has a new booking request for {} to {}.",
                booking.start_date, booking.end_date
            ),
            priority: Priority::Medium,
            data: booking_data(booking),
        }],
        DomainEvent::BookingConfirmed { booking } => vec![
            Draft {
                user_id: booking.renter_id,
                kind: NotificationKind::BookingConfirmed,
                title: "Booking confirmed",
                message: format!(
                    "You're all set: your booking from {} to {} is confirmed.",
                    booking.start_date, booking.end_date
                ),
                priority: Priority::High,
                data: booking_data(booking),
            },
            Draft {
                user_id: booking.owner_id,
                kind: NotificationKind::BookingConfirmed,
                title: "Your car was booked",
                message: format!(
                    "Your car is booked from {} to {}.",
                    booking.start_date, booking.end_date
                ),
                priority: Priority::Medium,
                data: booking_data(booking),
            },
        ],
        DomainEvent::BookingCancelled { booking, reason } => {
            let message = format!("Booking was cancelled: {}.", reason);
            vec![
                Draft {
                    user_id: booking.renter_id,
                    kind: NotificationKind::BookingCancelled,
                    title: "Booking cancelled",
                    message: message.clone(),
                    priority: Priority::High,
                    data: booking_data(booking),
                },
                Draft {
                    user_id: booking.owner_id,
                    kind: NotificationKind::BookingCancelled,
                    title: "Booking cancelled",
                    message,
                    priority: Priority::High,
                    data: booking_data(booking),
                },
            ]
        }
        DomainEvent::TripStarted { booking } => vec![Draft {
            user_id: booking.owner_id,
            kind: NotificationKind::TripStarted,
            title: "Trip started",
            message: "The renter has picked up your car.".into(),
            priority: Priority::Medium,
            data: booking_data(booking),
        }],
        DomainEvent::TripCompleted { booking } => vec![
            Draft {
                user_id: booking.renter_id,
                kind: NotificationKind::TripCompleted,
                title: "Trip completed",
                message: "Thanks for riding. How was the car? Leave a review.".into(),
                priority: Priority::Medium,
                data: booking_data(booking),
            },
            Draft {
                user_id: booking.owner_id,
                kind: NotificationKind::TripCompleted,
                title: "Trip completed",
                message: "Your car has been returned.".into(),
                priority: Priority::Medium,
                data: booking_data(booking),
            },
        ],
        DomainEvent::PaymentReceived { booking } => {
            let mut drafts = vec![Draft {
                user_id: booking.owner_id,
                kind: NotificationKind::PaymentReceived,
                title: "Payment received",
                message: format!(
                    "A payment of {} was received for your car.",
                    format_amount(booking.charges.total_amount)
                ),
                priority: Priority::High,
                data: booking_data(booking),
            }];
            // a payment that settled the booking also confirms it for the renter
            if booking.status == ryde_domain::BookingStatus::Confirmed {
                drafts.push(Draft {
                    user_id: booking.renter_id,
                    kind: NotificationKind::BookingConfirmed,
                    title: "Booking confirmed",
                    message: format!(
                        "Payment accepted. Your booking from {} to {} is confirmed.",
                        booking.start_date, booking.end_date
                    ),
                    priority: Priority::High,
                    data: booking_data(booking),
                });
            }
            drafts
        }
        DomainEvent::CarAvailable {
            user_id,
            car_id,
            car_name,
        } => vec![Draft {
            user_id: *user_id,
            kind: NotificationKind::CarAvailable,
            title: "Car available",
            message: format!("{} is available again.", car_name),
            priority: Priority::Medium,
            data: json!({ "car_id": car_id }),
        }],
        DomainEvent::ReviewReceived {
            user_id,
            reviewer_name,
            rating,
        } => vec![Draft {
            user_id: *user_id,
            kind: NotificationKind::ReviewReceived,
            title: "New review",
            message: format!("{} left you a {}-star review.", reviewer_name, rating),
            priority: Priority::Low,
            data: json!({ "rating": rating }),
        }],
        DomainEvent::MessageReceived {
            user_id,
            sender_name,
            preview,
        } => vec![Draft {
            user_id: *user_id,
            kind: NotificationKind::MessageReceived,
            title: "New message",
            message: format!("{}: {}", sender_name, preview),
            priority: Priority::Medium,
            data: json!({ "sender": sender_name }),
        }],
    }
}

/// Render the event for one explicit recipient, for the broadcast paths.
/// For booking events the recipient's role picks the wording; everyone else
/// gets the renter-facing copy.
fn draft_for(event: &DomainEvent, user_id: Uuid) -> Draft {
    let mut drafts = drafts_for(event);
    if let Some(pos) = drafts.iter().position(|d| d.user_id == user_id) {
        return drafts.swap_remove(pos);
    }
    // every event renders at least one draft
    let mut draft = drafts.swap_remove(0);
    draft.user_id = user_id;
    draft
}

fn format_amount(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

/// The single place that turns domain events into user-visible
/// notifications and picks a delivery path: durable store first, then live
/// fan-out when the user is online, push otherwise.
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationRepository>,
    registry: Arc<ConnectionRegistry>,
    push: Arc<PushSubscriptionManager>,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn NotificationRepository>,
        registry: Arc<ConnectionRegistry>,
        push: Arc<PushSubscriptionManager>,
    ) -> Self {
        Self {
            store,
            registry,
            push,
        }
    }

    /// Notify every recipient the event names. The durable write is the
    /// delivery guarantee; its failure fails the dispatch. Live and push
    /// failures never do.
    pub async fn dispatch(&self, event: &DomainEvent) -> Result<Vec<Notification>, NotifyError> {
        let mut stored = Vec::new();
        for draft in drafts_for(event) {
            stored.push(self.deliver(draft).await?);
        }
        Ok(stored)
    }

    /// Per-user variant for explicit recipient lists. One recipient's
    /// failure is logged and must not abort the rest. Returns how many
    /// notifications were durably stored.
    pub async fn dispatch_to_many(&self, user_ids: &[Uuid], event: &DomainEvent) -> usize {
        let mut stored = 0;
        for &user_id in user_ids {
            match self.deliver(draft_for(event, user_id)).await {
                Ok(_) => stored += 1,
                Err(e) => warn!(%user_id, error = %e, "dispatch failed for recipient"),
            }
        }
        stored
    }

    /// Broadcast to every reachable user. With no user directory in scope,
    /// "all" is the union of online users and push-subscribed users.
    pub async fn dispatch_to_all(&self, event: &DomainEvent) -> usize {
        let mut targets = self.registry.online_users().await;
        match self.push.subscribed_user_ids().await {
            Ok(ids) => targets.extend(ids),
            Err(e) => warn!(error = %e, "could not enumerate push subscribers"),
        }
        targets.sort_unstable();
        targets.dedup();
        self.dispatch_to_many(&targets, event).await
    }

    async fn deliver(&self, draft: Draft) -> Result<Notification, NotifyError> {
        let notification = Notification::new(
            draft.user_id,
            draft.kind,
            draft.title.to_string(),
            draft.message,
            draft.priority,
            draft.data,
        );

        // Durable copy first; everything after this point is best effort.
        self.store
            .insert(&notification)
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))?;

        if self.registry.is_online(notification.user_id).await {
            let delivered = self.registry.publish(&notification).await;
            debug!(
                user_id = %notification.user_id,
                connections = delivered,
                kind = notification.kind.as_str(),
                "notification delivered live"
            );
        } else {
            self.push
                .send_to_user(
                    notification.user_id,
                    &PushMessage {
                        title: notification.title.clone(),
                        body: notification.message.clone(),
                        data: notification.data.clone(),
                    },
                )
                .await;
        }

        Ok(notification)
    }

    /// Flip the read flag. Only the owning user may do so.
    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), NotifyError> {
        let notification = self
            .store
            .get(notification_id)
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))?
            .ok_or(NotifyError::NotFound(notification_id))?;

        if notification.user_id != user_id {
            return Err(NotifyError::Authorization);
        }

        self.store
            .set_read(notification_id)
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))
    }

    pub async fn list_notifications(&self, user_id: Uuid) -> Result<Vec<Notification>, NotifyError> {
        self.store
            .list_for_user(user_id)
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, NotifyError> {
        self.store
            .unread_count(user_id)
            .await
            .map_err(|e| NotifyError::Persistence(e.to_string()))
    }
}

/// The booking manager publishes here after each commit. The committed
/// operation must not be failed retroactively, so dispatch errors are
/// absorbed and logged.
#[async_trait]
impl EventSink for NotificationDispatcher {
    async fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.dispatch(&event).await {
            error!(error = %e, "notification dispatch failed after commit");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use ryde_core::push::MockPushGateway;
    use ryde_core::repository::StoreResult;
    use ryde_domain::{BookingCharges, BookingStatus, NewBooking, SubscriptionKeys};
    use ryde_store::{MemoryNotificationStore, MemoryPushSubscriptionStore};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    fn booking() -> Booking {
        Booking::new(NewBooking {
            car_id: Uuid::new_v4(),
            renter_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            start_date: NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2030, 6, 3).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            charges: BookingCharges {
                total_amount: 15000,
                service_fee: 1500,
                insurance: 900,
            },
        })
    }

    fn message_event(user_id: Uuid) -> DomainEvent {
        DomainEvent::MessageReceived {
            user_id,
            sender_name: "Dana".into(),
            preview: "is the car still free?".into(),
        }
    }

    struct Fixture {
        dispatcher: NotificationDispatcher,
        store: Arc<MemoryNotificationStore>,
        registry: Arc<ConnectionRegistry>,
        gateway: Arc<MockPushGateway>,
        subscriptions: Arc<PushSubscriptionManager>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryNotificationStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let gateway = Arc::new(MockPushGateway::new());
        let subscriptions = Arc::new(PushSubscriptionManager::new(
            Arc::new(MemoryPushSubscriptionStore::new()),
            gateway.clone(),
        ));
        let dispatcher =
            NotificationDispatcher::new(store.clone(), registry.clone(), subscriptions.clone());
        Fixture {
            dispatcher,
            store,
            registry,
            gateway,
            subscriptions,
        }
    }

    /// Store double that starts failing after `allow` successful inserts.
    struct FlakyStore {
        inner: MemoryNotificationStore,
        allow: usize,
        inserts: AtomicUsize,
    }

    #[async_trait]
    impl NotificationRepository for FlakyStore {
        async fn insert(&self, notification: &Notification) -> StoreResult<()> {
            if self.inserts.fetch_add(1, Ordering::SeqCst) >= self.allow {
                return Err("disk full".into());
            }
            self.inner.insert(notification).await
        }

        async fn get(&self, id: Uuid) -> StoreResult<Option<Notification>> {
            self.inner.get(id).await
        }

        async fn set_read(&self, id: Uuid) -> StoreResult<()> {
            self.inner.set_read(id).await
        }

        async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
            self.inner.list_for_user(user_id).await
        }

        async fn unread_count(&self, user_id: Uuid) -> StoreResult<u64> {
            self.inner.unread_count(user_id).await
        }
    }

    #[tokio::test]
    async fn test_dispatch_stores_exactly_one_when_offline() {
        let f = fixture();
        let user_id = Uuid::new_v4();

        f.dispatcher.dispatch(&message_event(user_id)).await.unwrap();

        let stored = f.store.list_for_user(user_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(!stored[0].read);
    }

    #[tokio::test]
    async fn test_dispatch_stores_exactly_one_when_online() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        f.registry.authenticate(Uuid::new_v4(), user_id, tx).await;

        f.dispatcher.dispatch(&message_event(user_id)).await.unwrap();

        assert_eq!(f.store.list_for_user(user_id).await.unwrap().len(), 1);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_both_connections_receive_payload() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        f.registry.authenticate(Uuid::new_v4(), user_id, tx1).await;
        f.registry.authenticate(Uuid::new_v4(), user_id, tx2).await;

        f.dispatcher.dispatch(&message_event(user_id)).await.unwrap();

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_one_dead_connection_does_not_starve_the_other() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        f.registry.authenticate(Uuid::new_v4(), user_id, tx1).await;
        f.registry.authenticate(Uuid::new_v4(), user_id, tx2).await;
        drop(rx1);

        f.dispatcher.dispatch(&message_event(user_id)).await.unwrap();

        assert!(rx2.recv().await.is_some());
        assert_eq!(f.store.list_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_booking_confirmed_notifies_both_sides() {
        let f = fixture();
        let booking = booking();

        let stored = f
            .dispatcher
            .dispatch(&DomainEvent::BookingConfirmed {
                booking: booking.clone(),
            })
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        assert_eq!(f.store.list_for_user(booking.renter_id).await.unwrap().len(), 1);
        assert_eq!(f.store.list_for_user(booking.owner_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_settling_payment_confirms_for_renter() {
        let f = fixture();
        let mut booking = booking();
        booking.status = BookingStatus::Confirmed;

        let stored = f
            .dispatcher
            .dispatch(&DomainEvent::PaymentReceived {
                booking: booking.clone(),
            })
            .await
            .unwrap();

        assert_eq!(stored.len(), 2);
        let renter_side = f.store.list_for_user(booking.renter_id).await.unwrap();
        assert_eq!(renter_side[0].kind, NotificationKind::BookingConfirmed);
        let owner_side = f.store.list_for_user(booking.owner_id).await.unwrap();
        assert_eq!(owner_side[0].kind, NotificationKind::PaymentReceived);
    }

    #[tokio::test]
    async fn test_offline_user_with_subscription_gets_push() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        f.subscriptions
            .subscribe(
                user_id,
                "https://push.example/dev".into(),
                SubscriptionKeys {
                    p256dh: "BPubKey".into(),
                    auth: "authsecret".into(),
                },
            )
            .await
            .unwrap();

        f.dispatcher.dispatch(&message_event(user_id)).await.unwrap();

        assert_eq!(f.gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_offline_user_without_subscription_is_fine() {
        let f = fixture();
        let user_id = Uuid::new_v4();

        let result = f.dispatcher.dispatch(&message_event(user_id)).await;

        assert!(result.is_ok());
        assert!(f.gateway.sent().is_empty());
        assert_eq!(f.store.list_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_fails_the_dispatch() {
        let registry = Arc::new(ConnectionRegistry::new());
        let subscriptions = Arc::new(PushSubscriptionManager::new(
            Arc::new(MemoryPushSubscriptionStore::new()),
            Arc::new(MockPushGateway::new()),
        ));
        let dispatcher = NotificationDispatcher::new(
            Arc::new(FlakyStore {
                inner: MemoryNotificationStore::new(),
                allow: 0,
                inserts: AtomicUsize::new(0),
            }),
            registry,
            subscriptions,
        );

        let result = dispatcher.dispatch(&message_event(Uuid::new_v4())).await;
        assert!(matches!(result, Err(NotifyError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_dispatch_to_many_survives_partial_failure() {
        let registry = Arc::new(ConnectionRegistry::new());
        let subscriptions = Arc::new(PushSubscriptionManager::new(
            Arc::new(MemoryPushSubscriptionStore::new()),
            Arc::new(MockPushGateway::new()),
        ));
        let dispatcher = NotificationDispatcher::new(
            Arc::new(FlakyStore {
                inner: MemoryNotificationStore::new(),
                allow: 2,
                inserts: AtomicUsize::new(0),
            }),
            registry,
            subscriptions,
        );

        let users = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let stored = dispatcher
            .dispatch_to_many(&users, &message_event(users[0]))
            .await;

        // the third insert fails but the first two recipients were served
        assert_eq!(stored, 2);
    }

    #[tokio::test]
    async fn test_dispatch_to_all_covers_online_and_subscribed() {
        let f = fixture();
        let online = Uuid::new_v4();
        let subscribed = Uuid::new_v4();

        let (tx, _rx) = mpsc::unbounded_channel();
        f.registry.authenticate(Uuid::new_v4(), online, tx).await;
        f.subscriptions
            .subscribe(
                subscribed,
                "https://push.example/dev".into(),
                SubscriptionKeys {
                    p256dh: "BPubKey".into(),
                    auth: "authsecret".into(),
                },
            )
            .await
            .unwrap();

        let stored = f
            .dispatcher
            .dispatch_to_all(&message_event(online))
            .await;

        assert_eq!(stored, 2);
        assert_eq!(f.store.list_for_user(online).await.unwrap().len(), 1);
        assert_eq!(f.store.list_for_user(subscribed).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_by_owner() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let stored = f.dispatcher.dispatch(&message_event(user_id)).await.unwrap();

        f.dispatcher.mark_read(stored[0].id, user_id).await.unwrap();

        let after = f.store.get(stored[0].id).await.unwrap().unwrap();
        assert!(after.read);
        assert_eq!(f.dispatcher.unread_count(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_read_by_stranger_is_rejected() {
        let f = fixture();
        let user_id = Uuid::new_v4();
        let stored = f.dispatcher.dispatch(&message_event(user_id)).await.unwrap();

        let result = f.dispatcher.mark_read(stored[0].id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(NotifyError::Authorization)));

        let after = f.store.get(stored[0].id).await.unwrap().unwrap();
        assert!(!after.read);
    }
}
