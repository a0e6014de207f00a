use axum::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{AssignTarget, Event, EventStatus, Ticket, TicketAssignee, TicketType, User};
use crate::utils::AppError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// One line item of a checkout.
#[derive(Debug, Clone, Copy)]
pub struct ReservationLine {
    pub ticket_type_id: Uuid,
    pub quantity: u32,
}

/// Partial update for a ticket type. Quantity raises re-run the capacity
/// check inside the same unit of work as the write.
#[derive(Debug, Clone, Default)]
pub struct TicketTypePatch {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub remaining_quantity: Option<i32>,
    pub max_per_user: Option<i32>,
    pub sale_start_date: Option<DateTime<Utc>>,
    pub sale_end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub events_completed: u64,
    pub tickets_expired: u64,
}

/// Persistence port. Every write method is one atomic unit of work: the
/// Postgres backend wraps it in a transaction with row locks or conditional
/// updates, the in-memory backend holds its single lock for the whole
/// mutation. `TicketType.remaining_quantity` is written exclusively through
/// `reserve` (conditional decrement) and `cancel_and_restock` (compensation);
/// no other path touches it besides organizer edits, which re-validate
/// capacity in-transaction.
#[async_trait]
pub trait Store: Send + Sync {
    // -- users ------------------------------------------------------------
    async fn user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn insert_user(&self, user: User) -> Result<User, AppError>;

    // -- events -----------------------------------------------------------
    async fn create_event(&self, event: Event) -> Result<Event, AppError>;
    async fn event(&self, id: Uuid) -> Result<Option<Event>, AppError>;

    /// Fails `InvalidState` for transitions the event lifecycle forbids.
    async fn update_event_status(&self, id: Uuid, next: EventStatus) -> Result<Event, AppError>;

    /// Fails `CapacityExceeded` when the new ceiling is below what is
    /// already committed (type quantities + sold seats), checked under the
    /// same unit of work as the write.
    async fn update_event_capacity(&self, id: Uuid, new_capacity: i32)
        -> Result<Event, AppError>;

    // -- ticket types -----------------------------------------------------
    /// Capacity-checked create: sibling quantities + sold seats + the
    /// candidate quantity must fit the event capacity.
    async fn create_ticket_type(&self, ticket_type: TicketType) -> Result<TicketType, AppError>;

    async fn update_ticket_type(
        &self,
        id: Uuid,
        patch: TicketTypePatch,
    ) -> Result<TicketType, AppError>;

    async fn ticket_type(&self, id: Uuid) -> Result<Option<TicketType>, AppError>;
    async fn ticket_types_for_event(&self, event_id: Uuid) -> Result<Vec<TicketType>, AppError>;

    /// Seats currently held against the event capacity (PENDING, VALID, USED).
    async fn sold_count(&self, event_id: Uuid) -> Result<i64, AppError>;

    /// Non-cancelled tickets the user holds of one type.
    async fn user_ticket_count(
        &self,
        user_id: Uuid,
        ticket_type_id: Uuid,
    ) -> Result<i64, AppError>;

    // -- tickets ----------------------------------------------------------
    /// The oversell barrier. For each line, decrement `remaining_quantity`
    /// only if it is still `>= quantity`; any line failing the conditional
    /// decrement aborts the whole unit (`InsufficientInventory`, nothing
    /// persisted). On success creates one PENDING ticket per unit, all
    /// stamped with `reference`.
    async fn reserve(
        &self,
        purchaser_id: Uuid,
        event_id: Uuid,
        lines: &[ReservationLine],
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, AppError>;

    async fn ticket(&self, id: Uuid) -> Result<Option<Ticket>, AppError>;
    async fn tickets_by_reference(&self, reference: &str) -> Result<Vec<Ticket>, AppError>;
    async fn tickets_for_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError>;

    /// Settlement success: PENDING -> VALID for the reference group. Returns
    /// the number of tickets transitioned; already-settled tickets are left
    /// alone, so replays return 0.
    async fn mark_valid(&self, reference: &str) -> Result<u64, AppError>;

    /// Settlement failure: for every still-PENDING ticket of the group,
    /// restore one unit of its type's inventory and mark it CANCELLED, all
    /// in one unit of work.
    async fn cancel_and_restock(&self, reference: &str) -> Result<u64, AppError>;

    // -- assignees --------------------------------------------------------
    /// Uniqueness (one assignee per ticket, one assignment per event target)
    /// is re-enforced at write time; violations fail `Conflict`.
    async fn create_assignee(&self, assignee: TicketAssignee)
        -> Result<TicketAssignee, AppError>;

    async fn assignee(&self, id: Uuid) -> Result<Option<TicketAssignee>, AppError>;
    async fn assignee_for_ticket(&self, ticket_id: Uuid)
        -> Result<Option<TicketAssignee>, AppError>;
    async fn assignment_exists(
        &self,
        event_id: Uuid,
        target: &AssignTarget,
    ) -> Result<bool, AppError>;
    async fn assignees_for_event(&self, event_id: Uuid) -> Result<Vec<TicketAssignee>, AppError>;

    /// Returns whether an assignee row existed.
    async fn delete_assignee(&self, ticket_id: Uuid) -> Result<bool, AppError>;

    /// Atomic check-in: stamp `attended_at` (must be unset) and transition
    /// the underlying ticket VALID -> USED. Fails `AlreadyCheckedIn` or
    /// `InvalidState` without partial effects.
    async fn check_in(&self, assignee_id: Uuid, now: DateTime<Utc>)
        -> Result<TicketAssignee, AppError>;

    // -- lifecycle sweep --------------------------------------------------
    /// Complete PUBLISHED events whose end date has passed and expire their
    /// still-VALID tickets. Idempotent; each event is settled atomically.
    async fn complete_ended_events(&self, now: DateTime<Utc>) -> Result<SweepOutcome, AppError>;
}
