use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Active,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Active => "ACTIVE",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "ACTIVE" => Some(BookingStatus::Active),
            "COMPLETED" => Some(BookingStatus::Completed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states never leave once entered.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state, evolving independently of the booking status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "PENDING",
            PaymentState::Paid => "PAID",
            PaymentState::Failed => "FAILED",
            PaymentState::Refunded => "REFUNDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentState::Pending),
            "PAID" => Some(PaymentState::Paid),
            "FAILED" => Some(PaymentState::Failed),
            "REFUNDED" => Some(PaymentState::Refunded),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Amounts are fixed once the booking is confirmed, in minor units (cents).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingCharges {
    pub total_amount: i64,
    pub service_fee: i64,
    pub insurance: i64,
}

/// A reservation of a car for a date/time range by a renter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub car_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub payment_status: PaymentState,
    pub charges: BookingCharges,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a booking; the manager assigns id, status and timestamps.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub car_id: Uuid,
    pub renter_id: Uuid,
    pub owner_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub charges: BookingCharges,
}

impl Booking {
    pub fn new(req: NewBooking) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            car_id: req.car_id,
            renter_id: req.renter_id,
            owner_id: req.owner_id,
            start_date: req.start_date,
            end_date: req.end_date,
            start_time: req.start_time,
            end_time: req.end_time,
            status: BookingStatus::Pending,
            payment_status: PaymentState::Pending,
            charges: req.charges,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start of the rental window (date + time combined).
    pub fn pickup(&self) -> NaiveDateTime {
        self.start_date.and_time(self.start_time)
    }

    /// End of the rental window. The window is half-open: [pickup, dropoff).
    pub fn dropoff(&self) -> NaiveDateTime {
        self.end_date.and_time(self.end_time)
    }

    /// Whether this booking occupies the car for availability purposes.
    pub fn blocks_availability(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    /// Half-open interval overlap against another booking's window.
    pub fn overlaps(&self, other: &Booking) -> bool {
        self.pickup() < other.dropoff() && other.pickup() < self.dropoff()
    }

    pub fn update_status(&mut self, new_status: BookingStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    pub fn update_payment(&mut self, new_state: PaymentState) {
        self.payment_status = new_state;
        self.updated_at = Utc::now();
    }
}
