use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::store::{Store, SweepOutcome};
use crate::utils::AppError;

/// One pass: complete PUBLISHED events whose end date has passed and expire
/// their still-VALID tickets. Idempotent.
pub async fn sweep_once(store: &dyn Store, now: DateTime<Utc>) -> Result<SweepOutcome, AppError> {
    let outcome = store.complete_ended_events(now).await?;
    if outcome.events_completed > 0 {
        tracing::info!(
            events = outcome.events_completed,
            tickets = outcome.tickets_expired,
            "lifecycle sweep settled ended events"
        );
    }
    Ok(outcome)
}

/// Periodic background sweep, decoupled from request handling. Failures are
/// logged and the next tick retries; nothing is surfaced to waiting clients.
pub fn run_sweeper(store: Arc<dyn Store>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_once(store.as_ref(), Utc::now()).await {
                tracing::error!(error = %e, "lifecycle sweep failed, will retry next tick");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventStatus, TicketStatus};
    use crate::store::{MemoryStore, ReservationLine};
    use crate::testing::{fixtures, seed};
    use uuid::Uuid;

    #[tokio::test]
    async fn sweep_completes_ended_events_and_expires_valid_tickets() {
        let store = MemoryStore::new();
        // Started 6 hours ago, ran 4 hours: over.
        let ended = store
            .create_event(fixtures::event(100, EventStatus::Published, -6))
            .await
            .unwrap();
        let tt = seed::ticket_type(&store, &ended, 10, 5).await;
        let buyer = Uuid::new_v4();
        let valid = seed::valid_tickets(&store, &ended, &tt, buyer, 2).await;

        // A PENDING ticket of the same event must stay pending for its
        // settlement to resolve.
        let lines = [ReservationLine {
            ticket_type_id: tt.id,
            quantity: 1,
        }];
        let pending = store
            .reserve(buyer, ended.id, &lines, "ref-sweep", Utc::now())
            .await
            .unwrap();

        let upcoming = seed::published_event(&store, 100).await;

        let outcome = sweep_once(&store, Utc::now()).await.unwrap();
        assert_eq!(outcome.events_completed, 1);
        assert_eq!(outcome.tickets_expired, 2);

        let event = store.event(ended.id).await.unwrap().unwrap();
        assert_eq!(event.status, EventStatus::Completed);
        for t in &valid {
            let t = store.ticket(t.id).await.unwrap().unwrap();
            assert_eq!(t.status, TicketStatus::Expired);
        }
        let p = store.ticket(pending[0].id).await.unwrap().unwrap();
        assert_eq!(p.status, TicketStatus::Pending);

        let untouched = store.event(upcoming.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, EventStatus::Published);
    }

    #[tokio::test]
    async fn second_sweep_changes_nothing() {
        let store = MemoryStore::new();
        let ended = store
            .create_event(fixtures::event(100, EventStatus::Published, -6))
            .await
            .unwrap();
        let tt = seed::ticket_type(&store, &ended, 10, 5).await;
        seed::valid_tickets(&store, &ended, &tt, Uuid::new_v4(), 1).await;

        let first = sweep_once(&store, Utc::now()).await.unwrap();
        assert_eq!(first.events_completed, 1);

        let second = sweep_once(&store, Utc::now()).await.unwrap();
        assert_eq!(second, SweepOutcome::default());
    }

    #[tokio::test]
    async fn completing_by_hand_is_rejected_so_no_valid_ticket_skips_expiry() {
        let store = MemoryStore::new();
        let ended = store
            .create_event(fixtures::event(100, EventStatus::Published, -6))
            .await
            .unwrap();
        let tt = seed::ticket_type(&store, &ended, 10, 5).await;
        let valid = seed::valid_tickets(&store, &ended, &tt, Uuid::new_v4(), 2).await;

        // The status PATCH cannot write COMPLETED; only the sweep can, and
        // the sweep also expires the tickets.
        assert!(matches!(
            store
                .update_event_status(ended.id, EventStatus::Completed)
                .await,
            Err(crate::utils::AppError::InvalidState(_))
        ));

        let outcome = sweep_once(&store, Utc::now()).await.unwrap();
        assert_eq!(outcome.events_completed, 1);
        assert_eq!(outcome.tickets_expired, 2);
        for t in &valid {
            let t = store.ticket(t.id).await.unwrap().unwrap();
            assert_eq!(t.status, TicketStatus::Expired);
        }
    }

    #[tokio::test]
    async fn draft_and_cancelled_events_are_ignored() {
        let store = MemoryStore::new();
        store
            .create_event(fixtures::event(100, EventStatus::Draft, -6))
            .await
            .unwrap();
        store
            .create_event(fixtures::event(100, EventStatus::Cancelled, -6))
            .await
            .unwrap();

        let outcome = sweep_once(&store, Utc::now()).await.unwrap();
        assert_eq!(outcome, SweepOutcome::default());
    }
}
