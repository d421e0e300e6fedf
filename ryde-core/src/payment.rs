use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentOutcome {
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResult {
    pub outcome: PaymentOutcome,
    pub reference: String,
}

/// Contract with the external payment gateway. The booking manager records
/// charge outcomes and requests refunds; it never awaits refund completion.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Charge the renter for a booking.
    async fn charge(
        &self,
        booking_id: Uuid,
        amount: i64,
    ) -> Result<ChargeResult, Box<dyn std::error::Error + Send + Sync>>;

    /// Request a refund. Returning Ok means the request was accepted, not
    /// that the money has moved.
    async fn refund(
        &self,
        booking_id: Uuid,
        amount: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

pub struct MockPaymentAdapter {
    fail_charges: bool,
    refunds_requested: AtomicUsize,
}

impl MockPaymentAdapter {
    pub fn new() -> Self {
        Self {
            fail_charges: false,
            refunds_requested: AtomicUsize::new(0),
        }
    }

    /// Variant whose charges always come back declined.
    pub fn declining() -> Self {
        Self {
            fail_charges: true,
            refunds_requested: AtomicUsize::new(0),
        }
    }

    pub fn refunds_requested(&self) -> usize {
        self.refunds_requested.load(Ordering::SeqCst)
    }
}

impl Default for MockPaymentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn charge(
        &self,
        booking_id: Uuid,
        _amount: i64,
    ) -> Result<ChargeResult, Box<dyn std::error::Error + Send + Sync>> {
        if self.fail_charges {
            return Ok(ChargeResult {
                outcome: PaymentOutcome::Failed,
                reference: format!("mock_ch_{}", booking_id.simple()),
            });
        }
        Ok(ChargeResult {
            outcome: PaymentOutcome::Paid,
            reference: format!("mock_ch_{}", booking_id.simple()),
        })
    }

    async fn refund(
        &self,
        _booking_id: Uuid,
        _amount: i64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.refunds_requested.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
