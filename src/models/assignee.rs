use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The attendee identity bound to one purchased ticket. Distinct from the
/// purchaser: one checkout can cover several attendees.
///
/// Exactly one of `user_id` / `email` identifies the attendee: a registered
/// user id, or a raw email for an unregistered invitee.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketAssignee {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub event_id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub attended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TicketAssignee {
    pub fn checked_in(&self) -> bool {
        self.attended_at.is_some()
    }
}

/// Target of an assignment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
    User(Uuid),
    Guest {
        email: String,
        first_name: Option<String>,
        last_name: Option<String>,
    },
}
