use std::sync::Arc;

use crate::models::TicketStatus;
use crate::notify::{dispatch, Notification, NotificationDispatcher};
use crate::payments::{PaymentGateway, PaymentStatus};
use crate::store::Store;
use crate::utils::AppError;

#[derive(Debug, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Tickets transitioned PENDING -> VALID.
    Confirmed { tickets: u64 },
    /// Tickets cancelled and their inventory restored.
    Cancelled { tickets: u64 },
    /// Gateway has no terminal status yet; nothing mutated.
    PaymentPending,
    /// The reference was already resolved; nothing mutated.
    AlreadySettled,
}

/// Resolve one payment-reference group, from a webhook or a client verify
/// call. Safe to invoke any number of times: resolved groups short-circuit,
/// duplicate deliveries find nothing left in PENDING, and a gateway failure
/// propagates without touching ticket state so the caller can retry.
pub async fn reconcile(
    store: &dyn Store,
    gateway: &dyn PaymentGateway,
    notifier: Arc<dyn NotificationDispatcher>,
    reference: &str,
) -> Result<SettlementOutcome, AppError> {
    let tickets = store.tickets_by_reference(reference).await?;
    if tickets.is_empty() {
        return Err(AppError::NotFound(
            "No tickets for this payment reference".to_string(),
        ));
    }
    if !tickets.iter().any(|t| t.status == TicketStatus::Pending) {
        return Ok(SettlementOutcome::AlreadySettled);
    }

    let purchaser_id = tickets[0].purchaser_id;
    let event_id = tickets[0].event_id;

    match gateway.verify(reference).await? {
        PaymentStatus::Succeeded => {
            let transitioned = store.mark_valid(reference).await?;
            tracing::info!(reference, tickets = transitioned, "payment confirmed");
            dispatch(
                notifier,
                Notification::TicketsConfirmed {
                    purchaser_id,
                    event_id,
                    reference: reference.to_string(),
                    ticket_count: transitioned as usize,
                },
            );
            Ok(SettlementOutcome::Confirmed {
                tickets: transitioned,
            })
        }
        PaymentStatus::Failed => {
            let cancelled = store.cancel_and_restock(reference).await?;
            tracing::info!(reference, tickets = cancelled, "payment failed, inventory restored");
            dispatch(
                notifier,
                Notification::TicketsCancelled {
                    purchaser_id,
                    event_id,
                    reference: reference.to_string(),
                    ticket_count: cancelled as usize,
                },
            );
            Ok(SettlementOutcome::Cancelled { tickets: cancelled })
        }
        PaymentStatus::Pending => Ok(SettlementOutcome::PaymentPending),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingDispatcher;
    use crate::payments::SandboxGateway;
    use crate::services::reservation::{self, PurchaseRequest};
    use crate::store::{MemoryStore, ReservationLine};
    use crate::testing::seed;
    use chrono::Utc;
    use uuid::Uuid;

    async fn checkout(
        store: &MemoryStore,
        gateway: &SandboxGateway,
        ticket_type_id: Uuid,
        event_id: Uuid,
        quantity: u32,
    ) -> String {
        let outcome = reservation::purchase(
            store,
            gateway,
            Uuid::new_v4(),
            &PurchaseRequest {
                event_id,
                lines: vec![ReservationLine {
                    ticket_type_id,
                    quantity,
                }],
            },
            "NGN",
            Utc::now(),
        )
        .await
        .unwrap();
        outcome.reference
    }

    fn recorder() -> Arc<RecordingDispatcher> {
        Arc::new(RecordingDispatcher::default())
    }

    #[tokio::test]
    async fn successful_payment_validates_the_whole_group() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;
        let reference = checkout(&store, &gateway, tt.id, event.id, 3).await;

        let outcome = reconcile(&store, &gateway, recorder(), &reference)
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::Confirmed { tickets: 3 });

        let tickets = store.tickets_by_reference(&reference).await.unwrap();
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Valid));
        // Inventory stays spent on success.
        let reread = store.ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 7);
    }

    #[tokio::test]
    async fn failed_payment_cancels_and_restocks() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;
        let reference = checkout(&store, &gateway, tt.id, event.id, 2).await;
        gateway.resolve(&reference, crate::payments::PaymentStatus::Failed).await;

        let outcome = reconcile(&store, &gateway, recorder(), &reference)
            .await
            .unwrap();
        assert_eq!(outcome, SettlementOutcome::Cancelled { tickets: 2 });

        let tickets = store.tickets_by_reference(&reference).await.unwrap();
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Cancelled));
        let reread = store.ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 10);
    }

    #[tokio::test]
    async fn reconcile_is_idempotent_for_both_outcomes() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;

        let confirmed = checkout(&store, &gateway, tt.id, event.id, 2).await;
        reconcile(&store, &gateway, recorder(), &confirmed)
            .await
            .unwrap();
        assert_eq!(
            reconcile(&store, &gateway, recorder(), &confirmed)
                .await
                .unwrap(),
            SettlementOutcome::AlreadySettled
        );

        let failed = checkout(&store, &gateway, tt.id, event.id, 1).await;
        gateway.resolve(&failed, crate::payments::PaymentStatus::Failed).await;
        reconcile(&store, &gateway, recorder(), &failed)
            .await
            .unwrap();
        assert_eq!(
            reconcile(&store, &gateway, recorder(), &failed)
                .await
                .unwrap(),
            SettlementOutcome::AlreadySettled
        );

        // Replays changed nothing: success spent 2 units, failure restored 1.
        let reread = store.ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 8);
    }

    #[tokio::test]
    async fn unreachable_gateway_mutates_nothing() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;
        let reference = checkout(&store, &gateway, tt.id, event.id, 2).await;

        gateway.set_reachable(false).await;
        let err = reconcile(&store, &gateway, recorder(), &reference)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));

        let tickets = store.tickets_by_reference(&reference).await.unwrap();
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Pending));
    }

    #[tokio::test]
    async fn pending_status_leaves_tickets_pending() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;
        let reference = checkout(&store, &gateway, tt.id, event.id, 1).await;
        gateway.resolve(&reference, crate::payments::PaymentStatus::Pending).await;

        assert_eq!(
            reconcile(&store, &gateway, recorder(), &reference)
                .await
                .unwrap(),
            SettlementOutcome::PaymentPending
        );
        let tickets = store.tickets_by_reference(&reference).await.unwrap();
        assert!(tickets.iter().all(|t| t.status == TicketStatus::Pending));
    }

    #[tokio::test]
    async fn unknown_reference_is_not_found() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        assert!(matches!(
            reconcile(&store, &gateway, recorder(), "no-such-ref").await,
            Err(AppError::NotFound(_))
        ));
    }
}
