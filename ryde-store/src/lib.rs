pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod memory;
pub mod notify_repo;

pub use app_config::Config;
pub use booking_repo::PgBookingStore;
pub use database::Db;
pub use memory::{MemoryBookingStore, MemoryNotificationStore, MemoryPushSubscriptionStore};
pub use notify_repo::{PgNotificationStore, PgPushSubscriptionStore};
