//! Seed data helpers shared by the in-crate test modules.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{Event, EventStatus, Ticket, TicketAssignee, TicketType, User};
use crate::store::{ReservationLine, Store};

pub mod fixtures {
    use super::*;

    pub fn event(capacity: i32, status: EventStatus, starts_in_hours: i64) -> Event {
        let now = Utc::now();
        let start = now + Duration::hours(starts_in_hours);
        Event {
            id: Uuid::new_v4(),
            organizer_id: Uuid::new_v4(),
            title: "Test event".to_string(),
            description: None,
            location: Some("Main hall".to_string()),
            capacity,
            status,
            start_date: start,
            end_date: start + Duration::hours(4),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn ticket_type(event: &Event, quantity: i32, max_per_user: i32) -> TicketType {
        let now = Utc::now();
        TicketType {
            id: Uuid::new_v4(),
            event_id: event.id,
            name: "General admission".to_string(),
            price: Decimal::new(5000, 2),
            remaining_quantity: quantity,
            max_per_user,
            sale_start_date: now - Duration::hours(1),
            sale_end_date: event.start_date,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn user(email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn guest_assignee(event: &Event, ticket_id: Uuid, email: &str) -> TicketAssignee {
        TicketAssignee {
            id: Uuid::new_v4(),
            ticket_id,
            event_id: event.id,
            user_id: None,
            email: Some(email.to_string()),
            first_name: Some("Guest".to_string()),
            last_name: None,
            attended_at: None,
            created_at: Utc::now(),
        }
    }
}

pub mod seed {
    use super::*;

    pub async fn published_event(store: &dyn Store, capacity: i32) -> Event {
        store
            .create_event(fixtures::event(capacity, EventStatus::Published, 24))
            .await
            .unwrap()
    }

    /// Published event whose doors are currently open.
    pub async fn running_event(store: &dyn Store, capacity: i32) -> Event {
        store
            .create_event(fixtures::event(capacity, EventStatus::Published, -1))
            .await
            .unwrap()
    }

    pub async fn ticket_type(
        store: &dyn Store,
        event: &Event,
        quantity: i32,
        max_per_user: i32,
    ) -> TicketType {
        store
            .create_ticket_type(fixtures::ticket_type(event, quantity, max_per_user))
            .await
            .unwrap()
    }

    /// Reserve and settle `quantity` tickets so they land VALID.
    pub async fn valid_tickets(
        store: &dyn Store,
        event: &Event,
        ticket_type: &TicketType,
        purchaser_id: Uuid,
        quantity: u32,
    ) -> Vec<Ticket> {
        let reference = format!("seed-{}", Uuid::new_v4().simple());
        let lines = [ReservationLine {
            ticket_type_id: ticket_type.id,
            quantity,
        }];
        store
            .reserve(purchaser_id, event.id, &lines, &reference, Utc::now())
            .await
            .unwrap();
        store.mark_valid(&reference).await.unwrap();
        store.tickets_by_reference(&reference).await.unwrap()
    }
}
