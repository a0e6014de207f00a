use std::collections::HashMap;

use axum::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{InitializedPayment, PaymentGateway, PaymentMetadata, PaymentStatus};
use crate::utils::AppError;

const REFERENCE_LEN: usize = 24;

/// In-process gateway. Issues opaque references and reports a configurable
/// outcome on verify; unknown references are reported failed, matching how
/// providers treat abandoned transactions. Tests script outcomes per
/// reference with [`SandboxGateway::resolve`] and can sever the connection
/// with [`SandboxGateway::set_reachable`].
pub struct SandboxGateway {
    default_outcome: PaymentStatus,
    state: Mutex<GatewayState>,
}

struct GatewayState {
    outcomes: HashMap<String, PaymentStatus>,
    reachable: bool,
}

impl SandboxGateway {
    pub fn new(default_outcome: PaymentStatus) -> Self {
        Self {
            default_outcome,
            state: Mutex::new(GatewayState {
                outcomes: HashMap::new(),
                reachable: true,
            }),
        }
    }

    /// Pin the verify outcome for one reference.
    pub async fn resolve(&self, reference: &str, status: PaymentStatus) {
        let mut state = self.state.lock().await;
        state.outcomes.insert(reference.to_string(), status);
    }

    /// Simulate the provider becoming unreachable.
    pub async fn set_reachable(&self, reachable: bool) {
        self.state.lock().await.reachable = reachable;
    }

    fn new_reference() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(REFERENCE_LEN)
            .map(char::from)
            .collect()
    }
}

impl Default for SandboxGateway {
    fn default() -> Self {
        Self::new(PaymentStatus::Succeeded)
    }
}

#[async_trait]
impl PaymentGateway for SandboxGateway {
    async fn initialize(
        &self,
        amount: Decimal,
        currency: &str,
        metadata: PaymentMetadata,
    ) -> Result<InitializedPayment, AppError> {
        let mut state = self.state.lock().await;
        if !state.reachable {
            return Err(AppError::Gateway(
                "payment provider unreachable".to_string(),
            ));
        }

        let reference = Self::new_reference();
        state
            .outcomes
            .insert(reference.clone(), self.default_outcome);

        tracing::debug!(
            reference = %reference,
            amount = %amount,
            currency = %currency,
            purchaser = %metadata.purchaser_id,
            tickets = metadata.ticket_count,
            "sandbox payment initialized"
        );

        Ok(InitializedPayment {
            authorization_url: format!("https://checkout.sandbox.local/{reference}"),
            reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<PaymentStatus, AppError> {
        let state = self.state.lock().await;
        if !state.reachable {
            return Err(AppError::Gateway(
                "payment provider unreachable".to_string(),
            ));
        }

        Ok(state
            .outcomes
            .get(reference)
            .copied()
            .unwrap_or(PaymentStatus::Failed))
    }
}
