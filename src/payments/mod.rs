use axum::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::utils::AppError;

pub mod sandbox;

pub use sandbox::SandboxGateway;

/// Terminal (or not-yet-terminal) outcome of a gateway transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Succeeded,
    Failed,
    Pending,
}

/// Returned by `initialize`: the reference that stamps every ticket of the
/// checkout, plus the URL the buyer is redirected to.
#[derive(Debug, Clone)]
pub struct InitializedPayment {
    pub reference: String,
    pub authorization_url: String,
}

/// Checkout context forwarded to the provider.
#[derive(Debug, Clone)]
pub struct PaymentMetadata {
    pub event_id: Uuid,
    pub purchaser_id: Uuid,
    pub purchaser_email: String,
    pub ticket_count: u32,
}

/// External payment provider boundary. Real processors are out of scope; the
/// engine only relies on this contract. Both calls may fail transiently with
/// `AppError::Gateway`, and the callers treat that as retryable: `initialize`
/// failures abort the reservation with zero side effects, `verify` failures
/// mutate nothing.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: PaymentMetadata,
    ) -> Result<InitializedPayment, AppError>;

    async fn verify(&self, reference: &str) -> Result<PaymentStatus, AppError>;
}
