use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification type. Closed set; the dispatcher's template lookup matches
/// on this exhaustively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingRequested,
    BookingConfirmed,
    BookingCancelled,
    TripStarted,
    TripCompleted,
    PaymentReceived,
    CarAvailable,
    ReviewReceived,
    MessageReceived,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::BookingRequested => "booking_requested",
            NotificationKind::BookingConfirmed => "booking_confirmed",
            NotificationKind::BookingCancelled => "booking_cancelled",
            NotificationKind::TripStarted => "trip_started",
            NotificationKind::TripCompleted => "trip_completed",
            NotificationKind::PaymentReceived => "payment_received",
            NotificationKind::CarAvailable => "car_available",
            NotificationKind::ReviewReceived => "review_received",
            NotificationKind::MessageReceived => "message_received",
        }
    }

    /// Parse a wire-level type string. Unknown strings are the caller's
    /// problem to reject; in-process dispatch never goes through here.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "booking_requested" => Some(NotificationKind::BookingRequested),
            "booking_confirmed" => Some(NotificationKind::BookingConfirmed),
            "booking_cancelled" => Some(NotificationKind::BookingCancelled),
            "trip_started" => Some(NotificationKind::TripStarted),
            "trip_completed" => Some(NotificationKind::TripCompleted),
            "payment_received" => Some(NotificationKind::PaymentReceived),
            "car_available" => Some(NotificationKind::CarAvailable),
            "review_received" => Some(NotificationKind::ReviewReceived),
            "message_received" => Some(NotificationKind::MessageReceived),
            _ => None,
        }
    }
}

/// Notification priority level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            _ => None,
        }
    }
}

/// A user-visible notification. Created by the dispatcher, mutated only by
/// the owning user's mark-read, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: String,
        message: String,
        priority: Priority,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            title,
            message,
            priority,
            data,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn mark_read(&mut self) {
        self.read = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_round_trip() {
        for kind in [
            NotificationKind::BookingRequested,
            NotificationKind::BookingConfirmed,
            NotificationKind::BookingCancelled,
            NotificationKind::TripStarted,
            NotificationKind::TripCompleted,
            NotificationKind::PaymentReceived,
            NotificationKind::CarAvailable,
            NotificationKind::ReviewReceived,
            NotificationKind::MessageReceived,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("follow"), None);
    }

    #[test]
    fn test_new_notification_starts_unread() {
        let n = Notification::new(
            Uuid::new_v4(),
            NotificationKind::MessageReceived,
            "New message".into(),
            "hello".into(),
            Priority::Medium,
            serde_json::json!({}),
        );
        assert!(!n.read);
    }
}
