pub mod dispatcher;
pub mod push;
pub mod registry;

pub use dispatcher::{NotificationDispatcher, NotifyError};
pub use push::PushSubscriptionManager;
pub use registry::{ConnectionRegistry, LiveSender};
