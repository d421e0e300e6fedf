pub mod booking;
pub mod events;
pub mod notification;
pub mod subscription;

pub use booking::{Booking, BookingCharges, BookingStatus, NewBooking, PaymentState};
pub use events::DomainEvent;
pub use notification::{Notification, NotificationKind, Priority};
pub use subscription::{PushSubscription, SubscriptionKeys};
