use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{EventStatus, Ticket, TicketType};
use crate::payments::{PaymentGateway, PaymentMetadata};
use crate::store::{ReservationLine, Store};
use crate::utils::AppError;

#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub event_id: Uuid,
    pub lines: Vec<ReservationLine>,
}

#[derive(Debug)]
pub struct PurchaseOutcome {
    pub tickets: Vec<Ticket>,
    pub authorization_url: String,
    pub reference: String,
}

/// One checkout, possibly spanning several ticket types of the same event.
///
/// Every precondition runs before any write. The gateway call happens outside
/// any inventory mutation, so a provider failure or timeout leaves nothing
/// behind; the conditional decrement inside `store.reserve` then re-checks
/// availability and is the only oversell barrier.
pub async fn purchase(
    store: &dyn Store,
    gateway: &dyn PaymentGateway,
    purchaser_id: Uuid,
    request: &PurchaseRequest,
    currency: &str,
    now: DateTime<Utc>,
) -> Result<PurchaseOutcome, AppError> {
    validate_lines(&request.lines)?;

    let event = store
        .event(request.event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if event.status != EventStatus::Published {
        return Err(AppError::InvalidState(
            "tickets can only be purchased for a published event".to_string(),
        ));
    }

    let mut resolved: Vec<(TicketType, u32)> = Vec::with_capacity(request.lines.len());
    for line in &request.lines {
        let ticket_type = store
            .ticket_type(line.ticket_type_id)
            .await?
            .filter(|t| t.event_id == request.event_id)
            .ok_or_else(|| {
                AppError::NotFound("Ticket type not found for this event".to_string())
            })?;
        resolved.push((ticket_type, line.quantity));
    }

    for (ticket_type, quantity) in &resolved {
        if !ticket_type.sale_open_at(now) {
            return Err(AppError::SaleWindowClosed(format!(
                "sales for '{}' are closed",
                ticket_type.name
            )));
        }

        let held = store.user_ticket_count(purchaser_id, ticket_type.id).await?;
        if held + i64::from(*quantity) > i64::from(ticket_type.max_per_user) {
            return Err(AppError::PerUserLimitExceeded(format!(
                "limit is {} ticket(s) of '{}' per user",
                ticket_type.max_per_user, ticket_type.name
            )));
        }

        // Optimistic availability check; the decisive one re-runs under the
        // reservation transaction.
        if ticket_type.remaining_quantity < *quantity as i32 {
            return Err(AppError::InsufficientInventory(
                "Not enough tickets available".to_string(),
            ));
        }
    }

    let total: Decimal = resolved
        .iter()
        .map(|(ticket_type, quantity)| ticket_type.price * Decimal::from(*quantity))
        .sum();
    let ticket_count: u32 = resolved.iter().map(|(_, quantity)| *quantity).sum();

    let purchaser_email = store
        .user(purchaser_id)
        .await?
        .map(|u| u.email)
        .unwrap_or_else(|| format!("{purchaser_id}@unknown.local"));

    let payment = gateway
        .initialize(
            total,
            currency,
            PaymentMetadata {
                event_id: event.id,
                purchaser_id,
                purchaser_email,
                ticket_count,
            },
        )
        .await?;

    let tickets = store
        .reserve(
            purchaser_id,
            event.id,
            &request.lines,
            &payment.reference,
            now,
        )
        .await?;

    tracing::info!(
        reference = %payment.reference,
        event = %event.id,
        purchaser = %purchaser_id,
        tickets = tickets.len(),
        "reservation created"
    );

    Ok(PurchaseOutcome {
        tickets,
        authorization_url: payment.authorization_url,
        reference: payment.reference,
    })
}

fn validate_lines(lines: &[ReservationLine]) -> Result<(), AppError> {
    if lines.is_empty() {
        return Err(AppError::Validation(
            "At least one line item is required".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(AppError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }
        // Inventory columns are i32; a larger quantity must never reach the
        // store's decrement.
        if line.quantity > i32::MAX as u32 {
            return Err(AppError::Validation("Quantity is too large".to_string()));
        }
        if !seen.insert(line.ticket_type_id) {
            return Err(AppError::Validation(
                "Duplicate ticket type in request".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::{PaymentStatus, SandboxGateway};
    use crate::store::MemoryStore;
    use crate::testing::seed;
    use crate::models::TicketStatus;

    fn one_line(event_id: Uuid, ticket_type_id: Uuid, quantity: u32) -> PurchaseRequest {
        PurchaseRequest {
            event_id,
            lines: vec![ReservationLine {
                ticket_type_id,
                quantity,
            }],
        }
    }

    #[tokio::test]
    async fn purchase_creates_pending_tickets_and_decrements_inventory() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;
        let buyer = store
            .insert_user(crate::testing::fixtures::user("buyer@example.com"))
            .await
            .unwrap();

        let outcome = purchase(
            &store,
            &gateway,
            buyer.id,
            &one_line(event.id, tt.id, 3),
            "NGN",
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.tickets.len(), 3);
        assert!(outcome
            .tickets
            .iter()
            .all(|t| t.status == TicketStatus::Pending
                && t.payment_reference == outcome.reference));
        let reread = store.ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 7);
    }

    #[tokio::test]
    async fn oversized_quantity_is_rejected_before_touching_inventory() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, i32::MAX).await;

        let result = purchase(
            &store,
            &gateway,
            Uuid::new_v4(),
            &one_line(event.id, tt.id, i32::MAX as u32 + 1),
            "NGN",
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        let reread = store.ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 10);
    }

    #[tokio::test]
    async fn two_buyers_racing_the_last_unit_get_one_success() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 1, 5).await;

        let request = one_line(event.id, tt.id, 1);
        let now = Utc::now();
        let (a, b) = tokio::join!(
            purchase(&store, &gateway, Uuid::new_v4(), &request, "NGN", now),
            purchase(&store, &gateway, Uuid::new_v4(), &request, "NGN", now),
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        let failure = if a.is_err() { a.unwrap_err() } else { b.unwrap_err() };
        assert!(matches!(failure, AppError::InsufficientInventory(_)));

        let reread = store.ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 0);
    }

    #[tokio::test]
    async fn per_user_cap_rejects_without_touching_inventory() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 2).await;
        let buyer = Uuid::new_v4();
        seed::valid_tickets(&store, &event, &tt, buyer, 2).await;

        let err = purchase(
            &store,
            &gateway,
            buyer,
            &one_line(event.id, tt.id, 1),
            "NGN",
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::PerUserLimitExceeded(_)));

        let reread = store.ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 8);
    }

    #[tokio::test]
    async fn closed_sale_window_rejects() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;

        let too_late = tt.sale_end_date + chrono::Duration::minutes(1);
        let err = purchase(
            &store,
            &gateway,
            Uuid::new_v4(),
            &one_line(event.id, tt.id, 1),
            "NGN",
            too_late,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::SaleWindowClosed(_)));
    }

    #[tokio::test]
    async fn gateway_failure_leaves_zero_side_effects() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::new(PaymentStatus::Succeeded);
        gateway.set_reachable(false).await;
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;
        let buyer = Uuid::new_v4();

        let err = purchase(
            &store,
            &gateway,
            buyer,
            &one_line(event.id, tt.id, 2),
            "NGN",
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Gateway(_)));

        let reread = store.ticket_type(tt.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 10);
        assert!(store.tickets_for_user(buyer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_lines_and_zero_quantities_are_rejected_up_front() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = seed::published_event(&store, 100).await;
        let tt = seed::ticket_type(&store, &event, 10, 5).await;

        let dup = PurchaseRequest {
            event_id: event.id,
            lines: vec![
                ReservationLine {
                    ticket_type_id: tt.id,
                    quantity: 1,
                },
                ReservationLine {
                    ticket_type_id: tt.id,
                    quantity: 1,
                },
            ],
        };
        assert!(matches!(
            purchase(&store, &gateway, Uuid::new_v4(), &dup, "NGN", Utc::now()).await,
            Err(AppError::Validation(_))
        ));

        let zero = one_line(event.id, tt.id, 0);
        assert!(matches!(
            purchase(&store, &gateway, Uuid::new_v4(), &zero, "NGN", Utc::now()).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn draft_event_cannot_sell() {
        let store = MemoryStore::new();
        let gateway = SandboxGateway::default();
        let event = store
            .create_event(crate::testing::fixtures::event(
                100,
                EventStatus::Draft,
                24,
            ))
            .await
            .unwrap();
        let tt = seed::ticket_type(&store, &event, 10, 5).await;

        assert!(matches!(
            purchase(
                &store,
                &gateway,
                Uuid::new_v4(),
                &one_line(event.id, tt.id, 1),
                "NGN",
                Utc::now()
            )
            .await,
            Err(AppError::InvalidState(_))
        ));
    }
}
