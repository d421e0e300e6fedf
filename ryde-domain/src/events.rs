use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::Booking;
use crate::notification::NotificationKind;

/// A fact emitted after a durable state change. The set is closed so the
/// dispatcher's template lookup is exhaustive at compile time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingRequested {
        booking: Booking,
    },
    BookingConfirmed {
        booking: Booking,
    },
    BookingCancelled {
        booking: Booking,
        reason: String,
    },
    TripStarted {
        booking: Booking,
    },
    TripCompleted {
        booking: Booking,
    },
    PaymentReceived {
        booking: Booking,
    },
    CarAvailable {
        user_id: Uuid,
        car_id: Uuid,
        car_name: String,
    },
    ReviewReceived {
        user_id: Uuid,
        reviewer_name: String,
        rating: u8,
    },
    MessageReceived {
        user_id: Uuid,
        sender_name: String,
        preview: String,
    },
}

impl DomainEvent {
    /// The notification kind this event maps to for its primary recipient.
    pub fn kind(&self) -> NotificationKind {
        match self {
            DomainEvent::BookingRequested { .. } => NotificationKind::BookingRequested,
            DomainEvent::BookingConfirmed { .. } => NotificationKind::BookingConfirmed,
            DomainEvent::BookingCancelled { .. } => NotificationKind::BookingCancelled,
            DomainEvent::TripStarted { .. } => NotificationKind::TripStarted,
            DomainEvent::TripCompleted { .. } => NotificationKind::TripCompleted,
            DomainEvent::PaymentReceived { .. } => NotificationKind::PaymentReceived,
            DomainEvent::CarAvailable { .. } => NotificationKind::CarAvailable,
            DomainEvent::ReviewReceived { .. } => NotificationKind::ReviewReceived,
            DomainEvent::MessageReceived { .. } => NotificationKind::MessageReceived,
        }
    }
}
