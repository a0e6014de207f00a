use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A priced admission category with its own inventory pool.
///
/// `remaining_quantity` is the single contended resource of the whole engine.
/// It is only ever written through the store's conditional decrement (reserve)
/// and increment (settlement compensation) operations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub remaining_quantity: i32,
    pub max_per_user: i32,
    pub sale_start_date: DateTime<Utc>,
    pub sale_end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    pub fn sale_open_at(&self, now: DateTime<Utc>) -> bool {
        self.sale_start_date <= now && now <= self.sale_end_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TicketStatus {
    Pending,
    Valid,
    Used,
    Cancelled,
    Expired,
}

impl TicketStatus {
    /// Forward-only lifecycle:
    /// PENDING -> VALID | CANCELLED, VALID -> USED | EXPIRED.
    pub fn can_transition(self, next: TicketStatus) -> bool {
        matches!(
            (self, next),
            (TicketStatus::Pending, TicketStatus::Valid)
                | (TicketStatus::Pending, TicketStatus::Cancelled)
                | (TicketStatus::Valid, TicketStatus::Used)
                | (TicketStatus::Valid, TicketStatus::Expired)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TicketStatus::Used | TicketStatus::Cancelled | TicketStatus::Expired
        )
    }

    /// Statuses that occupy a seat against the event capacity.
    pub fn occupies_capacity(self) -> bool {
        matches!(
            self,
            TicketStatus::Pending | TicketStatus::Valid | TicketStatus::Used
        )
    }

    /// Statuses counted against a purchaser's `max_per_user` allowance.
    pub fn counts_toward_user_cap(self) -> bool {
        self != TicketStatus::Cancelled
    }
}

/// One seat. Tickets are only ever created PENDING by the reservation
/// workflow; `payment_reference` groups every ticket of one checkout.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub ticket_type_id: Uuid,
    pub purchaser_id: Uuid,
    pub status: TicketStatus,
    pub payment_reference: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
