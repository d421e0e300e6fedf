use async_trait::async_trait;
use ryde_domain::DomainEvent;

/// Consumer of domain events. The booking manager publishes here after each
/// store write commits, never before; delivery problems are the sink's to
/// absorb, so the committed operation cannot be failed retroactively.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

/// Sink that drops everything. Used where notification delivery is not
/// wired, e.g. manager unit tests.
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn publish(&self, _event: DomainEvent) {}
}
