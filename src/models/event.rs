use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
}

impl EventStatus {
    /// Organizer-driven transitions. COMPLETED is not reachable here: only
    /// the sweep writes it, together with expiring the event's VALID tickets.
    pub fn can_transition(self, next: EventStatus) -> bool {
        matches!(
            (self, next),
            (EventStatus::Draft, EventStatus::Published)
                | (EventStatus::Draft, EventStatus::Cancelled)
                | (EventStatus::Published, EventStatus::Cancelled)
        )
    }
}

/// `capacity` is the hard ceiling for every ticket-type quantity of the event;
/// see the checks in `services::capacity`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub capacity: i32,
    pub status: EventStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_publishes_but_never_completes_directly() {
        assert!(EventStatus::Draft.can_transition(EventStatus::Published));
        assert!(!EventStatus::Draft.can_transition(EventStatus::Completed));
    }

    #[test]
    fn completed_is_never_an_organizer_target() {
        for from in [EventStatus::Draft, EventStatus::Published] {
            assert!(!from.can_transition(EventStatus::Completed));
        }
    }

    #[test]
    fn completed_and_cancelled_are_terminal() {
        for next in [
            EventStatus::Draft,
            EventStatus::Published,
            EventStatus::Cancelled,
            EventStatus::Completed,
        ] {
            assert!(!EventStatus::Completed.can_transition(next));
            assert!(!EventStatus::Cancelled.can_transition(next));
        }
    }
}
