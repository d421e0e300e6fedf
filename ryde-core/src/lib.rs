pub mod events;
pub mod payment;
pub mod push;
pub mod repository;

pub use events::{EventSink, NullEventSink};
pub use payment::{ChargeResult, MockPaymentAdapter, PaymentAdapter, PaymentOutcome};
pub use push::{MockPushGateway, PushError, PushGateway, PushMessage};
