use chrono::{NaiveDateTime, Utc};
use ryde_core::events::EventSink;
use ryde_core::payment::{PaymentAdapter, PaymentOutcome};
use ryde_core::repository::BookingRepository;
use ryde_domain::{Booking, BookingStatus, DomainEvent, NewBooking, PaymentState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::locks::KeyedLocks;

const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("car is already booked from {start} to {end}")]
    Conflict {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("booking cannot be confirmed until payment settles")]
    PaymentPending,

    #[error("not allowed to act on this booking")]
    Authorization,

    #[error("booking not found: {0}")]
    NotFound(Uuid),

    #[error("booking is being modified, retry shortly")]
    Busy,

    #[error("store error: {0}")]
    Persistence(String),
}

/// The sole writer of booking status and payment state. Serializes the
/// availability check-then-write per car and emits exactly one domain event
/// after each committed mutation.
pub struct BookingManager {
    store: Arc<dyn BookingRepository>,
    payments: Arc<dyn PaymentAdapter>,
    events: Arc<dyn EventSink>,
    car_locks: KeyedLocks,
    booking_locks: KeyedLocks,
    lock_wait: Duration,
}

/// Allowed status edges. Everything else is rejected.
fn edge_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Pending, Cancelled)
            | (Confirmed, Active)
            | (Confirmed, Cancelled)
            | (Active, Completed)
            | (Active, Cancelled)
    )
}

impl BookingManager {
    pub fn new(
        store: Arc<dyn BookingRepository>,
        payments: Arc<dyn PaymentAdapter>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            payments,
            events,
            car_locks: KeyedLocks::new(),
            booking_locks: KeyedLocks::new(),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Create a booking in Pending/Pending after validating the window and
    /// the availability invariant for the car.
    pub async fn create_booking(&self, req: NewBooking) -> Result<Booking, BookingError> {
        let pickup = req.start_date.and_time(req.start_time);
        let dropoff = req.end_date.and_time(req.end_time);

        if dropoff <= pickup {
            return Err(BookingError::Validation(
                "drop-off must be after pick-up".into(),
            ));
        }
        if pickup <= Utc::now().naive_utc() {
            return Err(BookingError::Validation(
                "pick-up must be in the future".into(),
            ));
        }

        // The overlap check and the insert must not interleave with another
        // writer for the same car.
        let _guard = self
            .car_locks
            .acquire(req.car_id, self.lock_wait)
            .await
            .ok_or(BookingError::Busy)?;

        let existing = self
            .store
            .list_for_car(req.car_id, true)
            .await
            .map_err(Self::persistence)?;

        let booking = Booking::new(req);
        if let Some(other) = existing.iter().find(|b| b.overlaps(&booking)) {
            return Err(BookingError::Conflict {
                start: other.pickup(),
                end: other.dropoff(),
            });
        }

        self.store.insert(&booking).await.map_err(Self::persistence)?;
        drop(_guard);

        info!(booking_id = %booking.id, car_id = %booking.car_id, "booking created");
        self.events
            .publish(DomainEvent::BookingRequested {
                booking: booking.clone(),
            })
            .await;

        Ok(booking)
    }

    /// Drive the booking along one of the allowed status edges. Only the
    /// renter or the car owner may act. Cancelling a paid booking flips the
    /// payment state to Refunded and requests (without awaiting completion
    /// of) a refund from the payment gateway.
    pub async fn transition_status(
        &self,
        booking_id: Uuid,
        target: BookingStatus,
        actor_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        let _guard = self
            .booking_locks
            .acquire(booking_id, self.lock_wait)
            .await
            .ok_or(BookingError::Busy)?;

        let mut booking = self
            .store
            .get(booking_id)
            .await
            .map_err(Self::persistence)?
            .ok_or(BookingError::NotFound(booking_id))?;

        if actor_id != booking.renter_id && actor_id != booking.owner_id {
            return Err(BookingError::Authorization);
        }

        let from = booking.status;
        if !edge_allowed(from, target) {
            return Err(BookingError::InvalidTransition { from, to: target });
        }

        if target == BookingStatus::Confirmed && booking.payment_status != PaymentState::Paid {
            return Err(BookingError::PaymentPending);
        }

        let mut refund_due = false;
        if target == BookingStatus::Cancelled {
            let reason = reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty());
            if reason.is_none()
                && matches!(from, BookingStatus::Confirmed | BookingStatus::Active)
            {
                return Err(BookingError::Validation(
                    "a cancellation reason is required".into(),
                ));
            }
            booking.cancel_reason = reason.map(str::to_owned);
            if booking.payment_status == PaymentState::Paid {
                booking.update_payment(PaymentState::Refunded);
                refund_due = true;
            }
        }

        booking.update_status(target);
        self.store.update(&booking).await.map_err(Self::persistence)?;

        if refund_due {
            // Request only; completion is the gateway's side of the contract.
            if let Err(e) = self
                .payments
                .refund(booking.id, booking.charges.total_amount)
                .await
            {
                warn!(booking_id = %booking.id, error = %e, "refund request failed");
            }
        }

        info!(booking_id = %booking.id, from = %from, to = %target, "booking transitioned");

        let event = match target {
            BookingStatus::Confirmed => DomainEvent::BookingConfirmed {
                booking: booking.clone(),
            },
            BookingStatus::Active => DomainEvent::TripStarted {
                booking: booking.clone(),
            },
            BookingStatus::Completed => DomainEvent::TripCompleted {
                booking: booking.clone(),
            },
            BookingStatus::Cancelled => DomainEvent::BookingCancelled {
                booking: booking.clone(),
                reason: booking
                    .cancel_reason
                    .clone()
                    .unwrap_or_else(|| "cancelled before confirmation".into()),
            },
            // no edge leads back to Pending; rejected above
            BookingStatus::Pending => {
                return Err(BookingError::InvalidTransition { from, to: target })
            }
        };

        // Published inside the per-booking guard so events leave in the
        // order the transitions committed.
        self.events.publish(event).await;

        Ok(booking)
    }

    /// Record the payment gateway's outcome for a booking. A Paid outcome
    /// while the booking is still Pending auto-advances it to Confirmed.
    /// Payments reported against a cancelled booking are ignored.
    pub async fn record_payment(
        &self,
        booking_id: Uuid,
        outcome: PaymentOutcome,
    ) -> Result<Booking, BookingError> {
        let _guard = self
            .booking_locks
            .acquire(booking_id, self.lock_wait)
            .await
            .ok_or(BookingError::Busy)?;

        let mut booking = self
            .store
            .get(booking_id)
            .await
            .map_err(Self::persistence)?
            .ok_or(BookingError::NotFound(booking_id))?;

        if booking.status == BookingStatus::Cancelled {
            warn!(booking_id = %booking.id, "payment reported for a cancelled booking, ignoring");
            return Ok(booking);
        }

        match outcome {
            PaymentOutcome::Paid => {
                booking.update_payment(PaymentState::Paid);
                if booking.status == BookingStatus::Pending {
                    booking.update_status(BookingStatus::Confirmed);
                }
                self.store.update(&booking).await.map_err(Self::persistence)?;

                info!(booking_id = %booking.id, status = %booking.status, "payment recorded");
                self.events
                    .publish(DomainEvent::PaymentReceived {
                        booking: booking.clone(),
                    })
                    .await;
            }
            PaymentOutcome::Failed => {
                booking.update_payment(PaymentState::Failed);
                self.store.update(&booking).await.map_err(Self::persistence)?;
                info!(booking_id = %booking.id, "charge declined");
            }
        }

        Ok(booking)
    }

    pub async fn get_booking(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.store
            .get(id)
            .await
            .map_err(Self::persistence)?
            .ok_or(BookingError::NotFound(id))
    }

    pub async fn list_bookings_for_car(
        &self,
        car_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Booking>, BookingError> {
        self.store
            .list_for_car(car_id, active_only)
            .await
            .map_err(Self::persistence)
    }

    pub async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        self.store
            .list_for_user(user_id)
            .await
            .map_err(Self::persistence)
    }

    fn persistence(e: Box<dyn std::error::Error + Send + Sync>) -> BookingError {
        BookingError::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, NaiveTime};
    use ryde_core::events::NullEventSink;
    use ryde_core::payment::MockPaymentAdapter;
    use ryde_domain::BookingCharges;
    use ryde_store::MemoryBookingStore;
    use std::sync::Mutex;

    struct RecordingSink {
        events: Mutex<Vec<DomainEvent>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }

        fn kinds(&self) -> Vec<&'static str> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.kind().as_str())
                .collect()
        }
    }

    #[async_trait]
    impl EventSink for RecordingSink {
        async fn publish(&self, event: DomainEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn request(car_id: Uuid, renter_id: Uuid, start_day: i64, end_day: i64) -> NewBooking {
        let today = Utc::now().date_naive();
        NewBooking {
            car_id,
            renter_id,
            owner_id: Uuid::new_v4(),
            start_date: today + ChronoDuration::days(start_day),
            end_date: today + ChronoDuration::days(end_day),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            charges: BookingCharges {
                total_amount: 15000,
                service_fee: 1500,
                insurance: 900,
            },
        }
    }

    fn manager_with(
        payments: Arc<MockPaymentAdapter>,
        events: Arc<dyn EventSink>,
    ) -> (BookingManager, Arc<MemoryBookingStore>) {
        let store = Arc::new(MemoryBookingStore::new());
        let manager = BookingManager::new(store.clone(), payments, events);
        (manager, store)
    }

    fn manager() -> (BookingManager, Arc<MemoryBookingStore>) {
        manager_with(Arc::new(MockPaymentAdapter::new()), Arc::new(NullEventSink))
    }

    /// Insert a booking directly in a given status, bypassing the manager.
    async fn seed(
        store: &MemoryBookingStore,
        status: BookingStatus,
        payment: PaymentState,
    ) -> Booking {
        let mut booking = Booking::new(request(Uuid::new_v4(), Uuid::new_v4(), 1, 3));
        booking.status = status;
        booking.payment_status = payment;
        store.insert(&booking).await.unwrap();
        booking
    }

    #[tokio::test]
    async fn test_create_booking_starts_pending() {
        let (manager, _) = manager();
        let booking = manager
            .create_booking(request(Uuid::new_v4(), Uuid::new_v4(), 1, 3))
            .await
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.payment_status, PaymentState::Pending);
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_range() {
        let (manager, _) = manager();
        let result = manager
            .create_booking(request(Uuid::new_v4(), Uuid::new_v4(), 3, 1))
            .await;
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_past_pickup() {
        let (manager, _) = manager();
        let result = manager
            .create_booking(request(Uuid::new_v4(), Uuid::new_v4(), -2, 2))
            .await;
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn test_overlapping_booking_conflicts() {
        let (manager, _) = manager();
        let car_id = Uuid::new_v4();

        let first = manager
            .create_booking(request(car_id, Uuid::new_v4(), 1, 3))
            .await
            .unwrap();

        // day 2..4 overlaps day 1..3
        let second = manager
            .create_booking(request(car_id, Uuid::new_v4(), 2, 4))
            .await;

        match second {
            Err(BookingError::Conflict { start, end }) => {
                assert_eq!(start, first.pickup());
                assert_eq!(end, first.dropoff());
            }
            other => panic!("expected Conflict, got {:?}", other.map(|b| b.id)),
        }
    }

    #[tokio::test]
    async fn test_overlap_property_across_range_grid() {
        // base window is day 10..14; every candidate window either overlaps
        // it (must conflict) or doesn't (must be accepted)
        let (manager, _) = manager();

        for start in 1..20i64 {
            for end in (start + 1)..21i64 {
                let car_id = Uuid::new_v4();
                manager
                    .create_booking(request(car_id, Uuid::new_v4(), 10, 14))
                    .await
                    .unwrap();

                let result = manager
                    .create_booking(request(car_id, Uuid::new_v4(), start, end))
                    .await;

                let overlaps = start < 14 && 10 < end;
                if overlaps {
                    assert!(
                        matches!(result, Err(BookingError::Conflict { .. })),
                        "window {start}..{end} must conflict with 10..14"
                    );
                } else {
                    assert!(
                        result.is_ok(),
                        "window {start}..{end} must not conflict with 10..14"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_adjacent_booking_is_allowed() {
        let (manager, _) = manager();
        let car_id = Uuid::new_v4();

        manager
            .create_booking(request(car_id, Uuid::new_v4(), 1, 3))
            .await
            .unwrap();
        // starts exactly at the first one's drop-off
        let second = manager
            .create_booking(request(car_id, Uuid::new_v4(), 3, 5))
            .await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_booking_frees_the_window() {
        let (manager, _) = manager();
        let car_id = Uuid::new_v4();
        let renter = Uuid::new_v4();

        let booking = manager
            .create_booking(request(car_id, renter, 1, 3))
            .await
            .unwrap();
        manager
            .transition_status(booking.id, BookingStatus::Cancelled, renter, None)
            .await
            .unwrap();

        let rebook = manager
            .create_booking(request(car_id, Uuid::new_v4(), 1, 3))
            .await;
        assert!(rebook.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_creates_admit_exactly_one() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);
        let car_id = Uuid::new_v4();

        let (a, b) = tokio::join!(
            manager.create_booking(request(car_id, Uuid::new_v4(), 1, 3)),
            manager.create_booking(request(car_id, Uuid::new_v4(), 2, 4)),
        );

        assert_eq!(
            a.is_ok() as u8 + b.is_ok() as u8,
            1,
            "exactly one of two overlapping creates may win"
        );
    }

    #[tokio::test]
    async fn test_transition_table() {
        use BookingStatus::*;
        let all = [Pending, Confirmed, Active, Completed, Cancelled];
        let allowed = [
            (Pending, Confirmed),
            (Pending, Cancelled),
            (Confirmed, Active),
            (Confirmed, Cancelled),
            (Active, Completed),
            (Active, Cancelled),
        ];

        for from in all {
            for to in all {
                let (manager, store) = manager();
                // paid so the Confirmed gate is not what we're measuring
                let booking = seed(&store, from, PaymentState::Paid).await;
                let result = manager
                    .transition_status(booking.id, to, booking.renter_id, Some("test".into()))
                    .await;

                if allowed.contains(&(from, to)) {
                    assert!(result.is_ok(), "{from} -> {to} should be allowed");
                } else {
                    assert!(
                        matches!(result, Err(BookingError::InvalidTransition { .. })),
                        "{from} -> {to} should be rejected"
                    );
                }
            }
        }
    }

    #[tokio::test]
    async fn test_confirm_requires_paid() {
        let (manager, store) = manager();
        let booking = seed(&store, BookingStatus::Pending, PaymentState::Pending).await;

        let result = manager
            .transition_status(booking.id, BookingStatus::Confirmed, booking.renter_id, None)
            .await;
        assert!(matches!(result, Err(BookingError::PaymentPending)));
    }

    #[tokio::test]
    async fn test_transition_requires_participant() {
        let (manager, store) = manager();
        let booking = seed(&store, BookingStatus::Pending, PaymentState::Paid).await;

        let stranger = Uuid::new_v4();
        let result = manager
            .transition_status(booking.id, BookingStatus::Confirmed, stranger, None)
            .await;
        assert!(matches!(result, Err(BookingError::Authorization)));
    }

    #[tokio::test]
    async fn test_paid_outcome_auto_confirms_pending() {
        let sink = Arc::new(RecordingSink::new());
        let (manager, store) =
            manager_with(Arc::new(MockPaymentAdapter::new()), sink.clone());
        let booking = seed(&store, BookingStatus::Pending, PaymentState::Pending).await;

        let updated = manager
            .record_payment(booking.id, PaymentOutcome::Paid)
            .await
            .unwrap();

        assert_eq!(updated.status, BookingStatus::Confirmed);
        assert_eq!(updated.payment_status, PaymentState::Paid);
        assert_eq!(sink.kinds(), vec!["payment_received"]);
    }

    #[tokio::test]
    async fn test_payment_never_resurrects_cancelled_booking() {
        let (manager, store) = manager();
        let booking = seed(&store, BookingStatus::Cancelled, PaymentState::Pending).await;

        let after = manager
            .record_payment(booking.id, PaymentOutcome::Paid)
            .await
            .unwrap();

        assert_eq!(after.status, BookingStatus::Cancelled);
        assert_eq!(after.payment_status, PaymentState::Pending);
    }

    #[tokio::test]
    async fn test_failed_outcome_records_and_keeps_status() {
        let (manager, store) = manager();
        let booking = seed(&store, BookingStatus::Pending, PaymentState::Pending).await;

        let after = manager
            .record_payment(booking.id, PaymentOutcome::Failed)
            .await
            .unwrap();

        assert_eq!(after.status, BookingStatus::Pending);
        assert_eq!(after.payment_status, PaymentState::Failed);
    }

    #[tokio::test]
    async fn test_cancelling_confirmed_needs_reason_and_refunds() {
        let payments = Arc::new(MockPaymentAdapter::new());
        let (manager, store) = manager_with(payments.clone(), Arc::new(NullEventSink));
        let booking = seed(&store, BookingStatus::Confirmed, PaymentState::Paid).await;

        let without_reason = manager
            .transition_status(booking.id, BookingStatus::Cancelled, booking.renter_id, None)
            .await;
        assert!(matches!(without_reason, Err(BookingError::Validation(_))));

        let cancelled = manager
            .transition_status(
                booking.id,
                BookingStatus::Cancelled,
                booking.renter_id,
                Some("plans changed".into()),
            )
            .await
            .unwrap();

        assert_eq!(cancelled.cancel_reason.as_deref(), Some("plans changed"));
        assert_eq!(cancelled.payment_status, PaymentState::Refunded);
        assert_eq!(payments.refunds_requested(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_scenario() {
        let (manager, _) = manager();
        let renter = Uuid::new_v4();
        let booking = manager
            .create_booking(request(Uuid::new_v4(), renter, 1, 3))
            .await
            .unwrap();

        let confirmed = manager
            .record_payment(booking.id, PaymentOutcome::Paid)
            .await
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let active = manager
            .transition_status(booking.id, BookingStatus::Active, renter, None)
            .await
            .unwrap();
        assert_eq!(active.status, BookingStatus::Active);

        let back_to_pending = manager
            .transition_status(booking.id, BookingStatus::Pending, renter, None)
            .await;
        assert!(matches!(
            back_to_pending,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_events_emitted_in_commit_order() {
        let sink = Arc::new(RecordingSink::new());
        let (manager, _) = manager_with(Arc::new(MockPaymentAdapter::new()), sink.clone());
        let renter = Uuid::new_v4();

        let booking = manager
            .create_booking(request(Uuid::new_v4(), renter, 1, 3))
            .await
            .unwrap();
        manager
            .record_payment(booking.id, PaymentOutcome::Paid)
            .await
            .unwrap();
        manager
            .transition_status(booking.id, BookingStatus::Active, renter, None)
            .await
            .unwrap();
        manager
            .transition_status(booking.id, BookingStatus::Completed, renter, None)
            .await
            .unwrap();

        assert_eq!(
            sink.kinds(),
            vec![
                "booking_requested",
                "payment_received",
                "trip_started",
                "trip_completed"
            ]
        );
    }
}
