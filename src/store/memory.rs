use std::collections::HashMap;

use axum::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ReservationLine, Store, SweepOutcome, TicketTypePatch};
use crate::models::{
    AssignTarget, Event, EventStatus, Ticket, TicketAssignee, TicketStatus, TicketType, User,
};
use crate::services::capacity;
use crate::utils::AppError;

/// Map-backed store. Every write method performs its whole mutation while
/// holding the single state lock, which makes each method one atomic unit of
/// work with the same contract as the Postgres backend.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
}

#[derive(Default)]
struct MemState {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    tickets: HashMap<Uuid, Ticket>,
    assignees: HashMap<Uuid, TicketAssignee>,
}

impl MemState {
    /// Sum of remaining quantities across the event's types, optionally
    /// excluding one (the candidate of an update).
    fn type_quantity_sum(&self, event_id: Uuid, exclude: Option<Uuid>) -> i64 {
        self.ticket_types
            .values()
            .filter(|t| t.event_id == event_id && Some(t.id) != exclude)
            .map(|t| i64::from(t.remaining_quantity))
            .sum()
    }

    fn sold_count(&self, event_id: Uuid) -> i64 {
        self.tickets
            .values()
            .filter(|t| t.event_id == event_id && t.status.occupies_capacity())
            .count() as i64
    }

    fn assignment_exists(&self, event_id: Uuid, target: &AssignTarget) -> bool {
        self.assignees.values().any(|a| {
            a.event_id == event_id
                && match target {
                    AssignTarget::User(user_id) => a.user_id == Some(*user_id),
                    AssignTarget::Guest { email, .. } => a
                        .email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email)),
                }
        })
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: User) -> Result<User, AppError> {
        self.state.lock().await.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn create_event(&self, event: Event) -> Result<Event, AppError> {
        self.state
            .lock()
            .await
            .events
            .insert(event.id, event.clone());
        Ok(event)
    }

    async fn event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn update_event_status(&self, id: Uuid, next: EventStatus) -> Result<Event, AppError> {
        let mut state = self.state.lock().await;
        let event = state
            .events
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        if !event.status.can_transition(next) {
            return Err(AppError::InvalidState(format!(
                "event cannot move from {:?} to {:?}",
                event.status, next
            )));
        }
        event.status = next;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn update_event_capacity(
        &self,
        id: Uuid,
        new_capacity: i32,
    ) -> Result<Event, AppError> {
        let mut state = self.state.lock().await;
        let total_in_use = {
            let event = state
                .events
                .get(&id)
                .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
            state.type_quantity_sum(event.id, None) + state.sold_count(event.id)
        };
        capacity::check_capacity_reduction(new_capacity, total_in_use)?;

        let event = state
            .events
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        event.capacity = new_capacity;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn create_ticket_type(&self, ticket_type: TicketType) -> Result<TicketType, AppError> {
        let mut state = self.state.lock().await;
        let event = state
            .events
            .get(&ticket_type.event_id)
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        capacity::check_capacity(
            event.capacity,
            state.type_quantity_sum(event.id, None),
            state.sold_count(event.id),
            ticket_type.remaining_quantity,
        )?;
        state
            .ticket_types
            .insert(ticket_type.id, ticket_type.clone());
        Ok(ticket_type)
    }

    async fn update_ticket_type(
        &self,
        id: Uuid,
        patch: TicketTypePatch,
    ) -> Result<TicketType, AppError> {
        let mut state = self.state.lock().await;
        let (event_id, current_quantity) = {
            let tt = state
                .ticket_types
                .get(&id)
                .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;
            (tt.event_id, tt.remaining_quantity)
        };

        if let Some(new_quantity) = patch.remaining_quantity {
            if new_quantity > current_quantity {
                let event = state
                    .events
                    .get(&event_id)
                    .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
                capacity::check_capacity(
                    event.capacity,
                    state.type_quantity_sum(event_id, Some(id)),
                    state.sold_count(event_id),
                    new_quantity,
                )?;
            }
        }

        let tt = state
            .ticket_types
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;
        if let Some(name) = patch.name {
            tt.name = name;
        }
        if let Some(price) = patch.price {
            tt.price = price;
        }
        if let Some(quantity) = patch.remaining_quantity {
            tt.remaining_quantity = quantity;
        }
        if let Some(max_per_user) = patch.max_per_user {
            tt.max_per_user = max_per_user;
        }
        if let Some(start) = patch.sale_start_date {
            tt.sale_start_date = start;
        }
        if let Some(end) = patch.sale_end_date {
            tt.sale_end_date = end;
        }
        tt.updated_at = Utc::now();
        Ok(tt.clone())
    }

    async fn ticket_type(&self, id: Uuid) -> Result<Option<TicketType>, AppError> {
        Ok(self.state.lock().await.ticket_types.get(&id).cloned())
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> Result<Vec<TicketType>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .ticket_types
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn sold_count(&self, event_id: Uuid) -> Result<i64, AppError> {
        Ok(self.state.lock().await.sold_count(event_id))
    }

    async fn user_ticket_count(
        &self,
        user_id: Uuid,
        ticket_type_id: Uuid,
    ) -> Result<i64, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .tickets
            .values()
            .filter(|t| {
                t.purchaser_id == user_id
                    && t.ticket_type_id == ticket_type_id
                    && t.status.counts_toward_user_cap()
            })
            .count() as i64)
    }

    async fn reserve(
        &self,
        purchaser_id: Uuid,
        event_id: Uuid,
        lines: &[ReservationLine],
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, AppError> {
        let mut state = self.state.lock().await;

        // Conditional decrements, applied line by line; if one fails, undo
        // the earlier ones before releasing the lock so the unit is
        // all-or-nothing.
        let mut applied: Vec<(Uuid, u32)> = Vec::new();
        for line in lines {
            let decremented = match state.ticket_types.get_mut(&line.ticket_type_id) {
                Some(tt) if tt.event_id == event_id => {
                    if tt.remaining_quantity >= line.quantity as i32 {
                        tt.remaining_quantity -= line.quantity as i32;
                        tt.updated_at = now;
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            };
            if decremented {
                applied.push((line.ticket_type_id, line.quantity));
            } else {
                for (type_id, quantity) in &applied {
                    if let Some(tt) = state.ticket_types.get_mut(type_id) {
                        tt.remaining_quantity += *quantity as i32;
                    }
                }
                return Err(AppError::InsufficientInventory(
                    "Not enough tickets available".to_string(),
                ));
            }
        }

        let mut tickets = Vec::new();
        for line in lines {
            for _ in 0..line.quantity {
                let ticket = Ticket {
                    id: Uuid::new_v4(),
                    event_id,
                    ticket_type_id: line.ticket_type_id,
                    purchaser_id,
                    status: TicketStatus::Pending,
                    payment_reference: reference.to_string(),
                    created_at: now,
                    updated_at: now,
                };
                state.tickets.insert(ticket.id, ticket.clone());
                tickets.push(ticket);
            }
        }
        Ok(tickets)
    }

    async fn ticket(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        Ok(self.state.lock().await.tickets.get(&id).cloned())
    }

    async fn tickets_by_reference(&self, reference: &str) -> Result<Vec<Ticket>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .tickets
            .values()
            .filter(|t| t.payment_reference == reference)
            .cloned()
            .collect())
    }

    async fn tickets_for_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .tickets
            .values()
            .filter(|t| t.purchaser_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_valid(&self, reference: &str) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut transitioned = 0;
        for ticket in state.tickets.values_mut() {
            if ticket.payment_reference == reference && ticket.status == TicketStatus::Pending {
                ticket.status = TicketStatus::Valid;
                ticket.updated_at = now;
                transitioned += 1;
            }
        }
        Ok(transitioned)
    }

    async fn cancel_and_restock(&self, reference: &str) -> Result<u64, AppError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let pending: Vec<(Uuid, Uuid)> = state
            .tickets
            .values()
            .filter(|t| t.payment_reference == reference && t.status == TicketStatus::Pending)
            .map(|t| (t.id, t.ticket_type_id))
            .collect();

        for (ticket_id, type_id) in &pending {
            if let Some(tt) = state.ticket_types.get_mut(type_id) {
                tt.remaining_quantity += 1;
                tt.updated_at = now;
            }
            if let Some(ticket) = state.tickets.get_mut(ticket_id) {
                ticket.status = TicketStatus::Cancelled;
                ticket.updated_at = now;
            }
        }
        Ok(pending.len() as u64)
    }

    async fn create_assignee(
        &self,
        assignee: TicketAssignee,
    ) -> Result<TicketAssignee, AppError> {
        let mut state = self.state.lock().await;
        if state
            .assignees
            .values()
            .any(|a| a.ticket_id == assignee.ticket_id)
        {
            return Err(AppError::Conflict(
                "Ticket already has an assignee".to_string(),
            ));
        }
        let target = match (assignee.user_id, &assignee.email) {
            (Some(user_id), _) => AssignTarget::User(user_id),
            (None, Some(email)) => AssignTarget::Guest {
                email: email.clone(),
                first_name: None,
                last_name: None,
            },
            (None, None) => {
                return Err(AppError::Validation(
                    "Assignee needs a user id or an email".to_string(),
                ))
            }
        };
        if state.assignment_exists(assignee.event_id, &target) {
            return Err(AppError::Conflict(
                "Attendee already holds a ticket for this event".to_string(),
            ));
        }
        state.assignees.insert(assignee.id, assignee.clone());
        Ok(assignee)
    }

    async fn assignee(&self, id: Uuid) -> Result<Option<TicketAssignee>, AppError> {
        Ok(self.state.lock().await.assignees.get(&id).cloned())
    }

    async fn assignee_for_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<TicketAssignee>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .assignees
            .values()
            .find(|a| a.ticket_id == ticket_id)
            .cloned())
    }

    async fn assignment_exists(
        &self,
        event_id: Uuid,
        target: &AssignTarget,
    ) -> Result<bool, AppError> {
        Ok(self.state.lock().await.assignment_exists(event_id, target))
    }

    async fn assignees_for_event(&self, event_id: Uuid) -> Result<Vec<TicketAssignee>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .assignees
            .values()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn delete_assignee(&self, ticket_id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.lock().await;
        let found = state
            .assignees
            .values()
            .find(|a| a.ticket_id == ticket_id)
            .map(|a| a.id);
        match found {
            Some(id) => {
                state.assignees.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn check_in(
        &self,
        assignee_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TicketAssignee, AppError> {
        let mut state = self.state.lock().await;
        let ticket_id = {
            let assignee = state
                .assignees
                .get(&assignee_id)
                .ok_or_else(|| AppError::NotFound("Assignee not found".to_string()))?;
            if assignee.checked_in() {
                return Err(AppError::AlreadyCheckedIn(
                    "Attendee has already checked in".to_string(),
                ));
            }
            assignee.ticket_id
        };

        // Guard the ticket transition before stamping attendance so a
        // failure leaves both rows untouched.
        let ticket = state
            .tickets
            .get_mut(&ticket_id)
            .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
        if !ticket.status.can_transition(TicketStatus::Used) {
            return Err(AppError::InvalidState(format!(
                "ticket is {:?}, not VALID",
                ticket.status
            )));
        }
        ticket.status = TicketStatus::Used;
        ticket.updated_at = now;

        let assignee = state
            .assignees
            .get_mut(&assignee_id)
            .ok_or_else(|| AppError::NotFound("Assignee not found".to_string()))?;
        assignee.attended_at = Some(now);
        Ok(assignee.clone())
    }

    async fn complete_ended_events(&self, now: DateTime<Utc>) -> Result<SweepOutcome, AppError> {
        let mut state = self.state.lock().await;
        let ended: Vec<Uuid> = state
            .events
            .values()
            .filter(|e| e.status == EventStatus::Published && e.end_date < now)
            .map(|e| e.id)
            .collect();

        let mut outcome = SweepOutcome::default();
        for event_id in ended {
            if let Some(event) = state.events.get_mut(&event_id) {
                event.status = EventStatus::Completed;
                event.updated_at = now;
                outcome.events_completed += 1;
            }
            for ticket in state.tickets.values_mut() {
                if ticket.event_id == event_id && ticket.status == TicketStatus::Valid {
                    ticket.status = TicketStatus::Expired;
                    ticket.updated_at = now;
                    outcome.tickets_expired += 1;
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, seed};

    #[tokio::test]
    async fn reserve_is_all_or_nothing_across_lines() {
        let store = MemoryStore::new();
        let event = seed::published_event(&store, 100).await;
        let plenty = seed::ticket_type(&store, &event, 10, 10).await;
        let scarce = seed::ticket_type(&store, &event, 1, 10).await;

        let lines = [
            ReservationLine {
                ticket_type_id: plenty.id,
                quantity: 3,
            },
            ReservationLine {
                ticket_type_id: scarce.id,
                quantity: 2,
            },
        ];
        let err = store
            .reserve(Uuid::new_v4(), event.id, &lines, "ref-1", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientInventory(_)));

        // First line's decrement was rolled back.
        let reread = store.ticket_type(plenty.id).await.unwrap().unwrap();
        assert_eq!(reread.remaining_quantity, 10);
        assert!(store.tickets_by_reference("ref-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reserve_rejects_type_of_another_event() {
        let store = MemoryStore::new();
        let event = seed::published_event(&store, 50).await;
        let other = seed::published_event(&store, 50).await;
        let foreign = seed::ticket_type(&store, &other, 5, 5).await;

        let lines = [ReservationLine {
            ticket_type_id: foreign.id,
            quantity: 1,
        }];
        let err = store
            .reserve(Uuid::new_v4(), event.id, &lines, "ref-2", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientInventory(_)));
    }

    #[tokio::test]
    async fn assignee_uniqueness_is_enforced_at_write() {
        let store = MemoryStore::new();
        let event = seed::published_event(&store, 50).await;
        let tt = seed::ticket_type(&store, &event, 5, 5).await;
        let buyer = Uuid::new_v4();
        let tickets = seed::valid_tickets(&store, &event, &tt, buyer, 2).await;

        let first = fixtures::guest_assignee(&event, tickets[0].id, "ada@example.com");
        store.create_assignee(first).await.unwrap();

        // Same ticket again.
        let dup_ticket = fixtures::guest_assignee(&event, tickets[0].id, "other@example.com");
        assert!(matches!(
            store.create_assignee(dup_ticket).await,
            Err(AppError::Conflict(_))
        ));

        // Same email, different ticket, same event (case-insensitive).
        let dup_email = fixtures::guest_assignee(&event, tickets[1].id, "Ada@Example.com");
        assert!(matches!(
            store.create_assignee(dup_email).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn remaining_plus_sold_never_exceeds_capacity() {
        let store = MemoryStore::new();
        let event = seed::published_event(&store, 10).await;
        let a = seed::ticket_type(&store, &event, 6, 10).await;
        let b = seed::ticket_type(&store, &event, 4, 10).await;

        // A third type cannot fit.
        assert!(matches!(
            store
                .create_ticket_type(fixtures::ticket_type(&event, 1, 10))
                .await,
            Err(AppError::CapacityExceeded(_))
        ));

        // Selling and settling moves seats between pools without creating
        // new ones.
        let buyer = Uuid::new_v4();
        seed::valid_tickets(&store, &event, &a, buyer, 3).await;
        store
            .reserve(
                buyer,
                event.id,
                &[ReservationLine {
                    ticket_type_id: b.id,
                    quantity: 2,
                }],
                "ref-inv",
                Utc::now(),
            )
            .await
            .unwrap();
        store.cancel_and_restock("ref-inv").await.unwrap();

        let remaining: i64 = store
            .ticket_types_for_event(event.id)
            .await
            .unwrap()
            .iter()
            .map(|t| i64::from(t.remaining_quantity))
            .sum();
        let sold = store.sold_count(event.id).await.unwrap();
        assert_eq!(remaining + sold, 10);

        // Raising a quantity past the ceiling is still rejected.
        assert!(matches!(
            store
                .update_ticket_type(
                    b.id,
                    TicketTypePatch {
                        remaining_quantity: Some(8),
                        ..Default::default()
                    }
                )
                .await,
            Err(AppError::CapacityExceeded(_))
        ));
    }

    #[tokio::test]
    async fn capacity_update_rejects_ceiling_below_commitments() {
        let store = MemoryStore::new();
        let event = seed::published_event(&store, 100).await;
        seed::ticket_type(&store, &event, 60, 10).await;

        assert!(store.update_event_capacity(event.id, 60).await.is_ok());
        assert!(matches!(
            store.update_event_capacity(event.id, 59).await,
            Err(AppError::CapacityExceeded(_))
        ));
    }
}
