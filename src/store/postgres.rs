use axum::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ReservationLine, Store, SweepOutcome, TicketTypePatch};
use crate::models::{
    AssignTarget, Event, EventStatus, Ticket, TicketAssignee, TicketType, User,
};
use crate::services::capacity;
use crate::utils::AppError;

/// Postgres-backed store. Each write method is one transaction; the event
/// row is locked (`FOR UPDATE`) wherever two organizer requests could race a
/// capacity check, and inventory moves only through conditional updates.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn committed_seats(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        event_id: Uuid,
        exclude_type: Option<Uuid>,
    ) -> Result<(i64, i64), AppError> {
        let type_sum: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(remaining_quantity), 0) FROM ticket_types
             WHERE event_id = $1 AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(event_id)
        .bind(exclude_type)
        .fetch_one(&mut **tx)
        .await?;

        let sold: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets
             WHERE event_id = $1 AND status IN ('PENDING', 'VALID', 'USED')",
        )
        .bind(event_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok((type_sum, sold))
    }

    async fn lock_event(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<Event, AppError> {
        sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: User) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, first_name, last_name, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(user.id)
        .bind(user.email)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_event(&self, event: Event) -> Result<Event, AppError> {
        let event = sqlx::query_as::<_, Event>(
            "INSERT INTO events
               (id, organizer_id, title, description, location, capacity, status,
                start_date, end_date, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(event.id)
        .bind(event.organizer_id)
        .bind(event.title)
        .bind(event.description)
        .bind(event.location)
        .bind(event.capacity)
        .bind(event.status)
        .bind(event.start_date)
        .bind(event.end_date)
        .bind(event.created_at)
        .bind(event.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(event)
    }

    async fn event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn update_event_status(&self, id: Uuid, next: EventStatus) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;
        let event = Self::lock_event(&mut tx, id).await?;
        if !event.status.can_transition(next) {
            return Err(AppError::InvalidState(format!(
                "event cannot move from {:?} to {:?}",
                event.status, next
            )));
        }
        let event = sqlx::query_as::<_, Event>(
            "UPDATE events SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(next)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn update_event_capacity(
        &self,
        id: Uuid,
        new_capacity: i32,
    ) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;
        let event = Self::lock_event(&mut tx, id).await?;
        let (type_sum, sold) = Self::committed_seats(&mut tx, event.id, None).await?;
        capacity::check_capacity_reduction(new_capacity, type_sum + sold)?;

        let event = sqlx::query_as::<_, Event>(
            "UPDATE events SET capacity = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(new_capacity)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn create_ticket_type(&self, ticket_type: TicketType) -> Result<TicketType, AppError> {
        let mut tx = self.pool.begin().await?;
        let event = Self::lock_event(&mut tx, ticket_type.event_id).await?;
        let (type_sum, sold) = Self::committed_seats(&mut tx, event.id, None).await?;
        capacity::check_capacity(
            event.capacity,
            type_sum,
            sold,
            ticket_type.remaining_quantity,
        )?;

        let ticket_type = sqlx::query_as::<_, TicketType>(
            "INSERT INTO ticket_types
               (id, event_id, name, price, remaining_quantity, max_per_user,
                sale_start_date, sale_end_date, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
        )
        .bind(ticket_type.id)
        .bind(ticket_type.event_id)
        .bind(ticket_type.name)
        .bind(ticket_type.price)
        .bind(ticket_type.remaining_quantity)
        .bind(ticket_type.max_per_user)
        .bind(ticket_type.sale_start_date)
        .bind(ticket_type.sale_end_date)
        .bind(ticket_type.created_at)
        .bind(ticket_type.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(ticket_type)
    }

    async fn update_ticket_type(
        &self,
        id: Uuid,
        patch: TicketTypePatch,
    ) -> Result<TicketType, AppError> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, TicketType>(
            "SELECT * FROM ticket_types WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

        if let Some(new_quantity) = patch.remaining_quantity {
            if new_quantity > current.remaining_quantity {
                let event = Self::lock_event(&mut tx, current.event_id).await?;
                let (type_sum, sold) =
                    Self::committed_seats(&mut tx, event.id, Some(id)).await?;
                capacity::check_capacity(event.capacity, type_sum, sold, new_quantity)?;
            }
        }

        let updated = sqlx::query_as::<_, TicketType>(
            "UPDATE ticket_types SET
               name = COALESCE($2, name),
               price = COALESCE($3, price),
               remaining_quantity = COALESCE($4, remaining_quantity),
               max_per_user = COALESCE($5, max_per_user),
               sale_start_date = COALESCE($6, sale_start_date),
               sale_end_date = COALESCE($7, sale_end_date),
               updated_at = $8
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.price)
        .bind(patch.remaining_quantity)
        .bind(patch.max_per_user)
        .bind(patch.sale_start_date)
        .bind(patch.sale_end_date)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn ticket_type(&self, id: Uuid) -> Result<Option<TicketType>, AppError> {
        let ticket_type =
            sqlx::query_as::<_, TicketType>("SELECT * FROM ticket_types WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(ticket_type)
    }

    async fn ticket_types_for_event(&self, event_id: Uuid) -> Result<Vec<TicketType>, AppError> {
        let ticket_types = sqlx::query_as::<_, TicketType>(
            "SELECT * FROM ticket_types WHERE event_id = $1 ORDER BY created_at",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ticket_types)
    }

    async fn sold_count(&self, event_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets
             WHERE event_id = $1 AND status IN ('PENDING', 'VALID', 'USED')",
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn user_ticket_count(
        &self,
        user_id: Uuid,
        ticket_type_id: Uuid,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tickets
             WHERE purchaser_id = $1 AND ticket_type_id = $2 AND status <> 'CANCELLED'",
        )
        .bind(user_id)
        .bind(ticket_type_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn reserve(
        &self,
        purchaser_id: Uuid,
        event_id: Uuid,
        lines: &[ReservationLine],
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Ticket>, AppError> {
        let mut tx = self.pool.begin().await?;

        // The conditional decrement is the oversell barrier: the quantity
        // check and the write are a single statement, so two concurrent
        // checkouts cannot both spend the last unit. A zero row count aborts
        // the whole transaction.
        for line in lines {
            let result = sqlx::query(
                "UPDATE ticket_types
                 SET remaining_quantity = remaining_quantity - $1, updated_at = $2
                 WHERE id = $3 AND event_id = $4 AND remaining_quantity >= $1",
            )
            .bind(line.quantity as i32)
            .bind(now)
            .bind(line.ticket_type_id)
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::InsufficientInventory(
                    "Not enough tickets available".to_string(),
                ));
            }
        }

        let mut tickets = Vec::new();
        for line in lines {
            for _ in 0..line.quantity {
                let ticket = sqlx::query_as::<_, Ticket>(
                    "INSERT INTO tickets
                       (id, event_id, ticket_type_id, purchaser_id, status,
                        payment_reference, created_at, updated_at)
                     VALUES ($1, $2, $3, $4, 'PENDING', $5, $6, $6) RETURNING *",
                )
                .bind(Uuid::new_v4())
                .bind(event_id)
                .bind(line.ticket_type_id)
                .bind(purchaser_id)
                .bind(reference)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;
                tickets.push(ticket);
            }
        }

        tx.commit().await?;
        Ok(tickets)
    }

    async fn ticket(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn tickets_by_reference(&self, reference: &str) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE payment_reference = $1 ORDER BY created_at",
        )
        .bind(reference)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn tickets_for_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE purchaser_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn mark_valid(&self, reference: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE tickets SET status = 'VALID', updated_at = $2
             WHERE payment_reference = $1 AND status = 'PENDING'",
        )
        .bind(reference)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn cancel_and_restock(&self, reference: &str) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let pending = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets
             WHERE payment_reference = $1 AND status = 'PENDING' FOR UPDATE",
        )
        .bind(reference)
        .fetch_all(&mut *tx)
        .await?;

        let now = Utc::now();
        for ticket in &pending {
            sqlx::query(
                "UPDATE ticket_types
                 SET remaining_quantity = remaining_quantity + 1, updated_at = $2
                 WHERE id = $1",
            )
            .bind(ticket.ticket_type_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "UPDATE tickets SET status = 'CANCELLED', updated_at = $2
             WHERE payment_reference = $1 AND status = 'PENDING'",
        )
        .bind(reference)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(pending.len() as u64)
    }

    async fn create_assignee(
        &self,
        assignee: TicketAssignee,
    ) -> Result<TicketAssignee, AppError> {
        // Unique indexes on ticket_id, (event_id, user_id) and
        // (event_id, lower(email)) are the authoritative guard; the service
        // pre-checks only produce friendlier messages.
        let assignee = sqlx::query_as::<_, TicketAssignee>(
            "INSERT INTO ticket_assignees
               (id, ticket_id, event_id, user_id, email, first_name, last_name,
                attended_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(assignee.id)
        .bind(assignee.ticket_id)
        .bind(assignee.event_id)
        .bind(assignee.user_id)
        .bind(assignee.email)
        .bind(assignee.first_name)
        .bind(assignee.last_name)
        .bind(assignee.attended_at)
        .bind(assignee.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Attendee already holds a ticket for this event".to_string())
            }
            _ => AppError::from(e),
        })?;
        Ok(assignee)
    }

    async fn assignee(&self, id: Uuid) -> Result<Option<TicketAssignee>, AppError> {
        let assignee =
            sqlx::query_as::<_, TicketAssignee>("SELECT * FROM ticket_assignees WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(assignee)
    }

    async fn assignee_for_ticket(
        &self,
        ticket_id: Uuid,
    ) -> Result<Option<TicketAssignee>, AppError> {
        let assignee = sqlx::query_as::<_, TicketAssignee>(
            "SELECT * FROM ticket_assignees WHERE ticket_id = $1",
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(assignee)
    }

    async fn assignment_exists(
        &self,
        event_id: Uuid,
        target: &AssignTarget,
    ) -> Result<bool, AppError> {
        let exists: bool = match target {
            AssignTarget::User(user_id) => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM ticket_assignees
                                   WHERE event_id = $1 AND user_id = $2)",
                )
                .bind(event_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?
            }
            AssignTarget::Guest { email, .. } => {
                sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM ticket_assignees
                                   WHERE event_id = $1 AND LOWER(email) = LOWER($2))",
                )
                .bind(event_id)
                .bind(email)
                .fetch_one(&self.pool)
                .await?
            }
        };
        Ok(exists)
    }

    async fn assignees_for_event(&self, event_id: Uuid) -> Result<Vec<TicketAssignee>, AppError> {
        let assignees = sqlx::query_as::<_, TicketAssignee>(
            "SELECT * FROM ticket_assignees WHERE event_id = $1
             ORDER BY attended_at DESC NULLS LAST, last_name, first_name",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(assignees)
    }

    async fn delete_assignee(&self, ticket_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM ticket_assignees WHERE ticket_id = $1")
            .bind(ticket_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn check_in(
        &self,
        assignee_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TicketAssignee, AppError> {
        let mut tx = self.pool.begin().await?;
        let assignee = sqlx::query_as::<_, TicketAssignee>(
            "SELECT * FROM ticket_assignees WHERE id = $1 FOR UPDATE",
        )
        .bind(assignee_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignee not found".to_string()))?;

        if assignee.checked_in() {
            return Err(AppError::AlreadyCheckedIn(
                "Attendee has already checked in".to_string(),
            ));
        }

        let ticket_updated = sqlx::query(
            "UPDATE tickets SET status = 'USED', updated_at = $2
             WHERE id = $1 AND status = 'VALID'",
        )
        .bind(assignee.ticket_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        if ticket_updated.rows_affected() == 0 {
            return Err(AppError::InvalidState(
                "ticket is not VALID".to_string(),
            ));
        }

        let assignee = sqlx::query_as::<_, TicketAssignee>(
            "UPDATE ticket_assignees SET attended_at = $2 WHERE id = $1 RETURNING *",
        )
        .bind(assignee_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(assignee)
    }

    async fn complete_ended_events(&self, now: DateTime<Utc>) -> Result<SweepOutcome, AppError> {
        let ended: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM events WHERE status = 'PUBLISHED' AND end_date < $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut outcome = SweepOutcome::default();
        for event_id in ended {
            let mut tx = self.pool.begin().await?;
            // Guard on the status so a concurrent sweep settles each event
            // exactly once.
            let completed = sqlx::query(
                "UPDATE events SET status = 'COMPLETED', updated_at = $2
                 WHERE id = $1 AND status = 'PUBLISHED'",
            )
            .bind(event_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            if completed.rows_affected() == 0 {
                continue;
            }
            let expired = sqlx::query(
                "UPDATE tickets SET status = 'EXPIRED', updated_at = $2
                 WHERE event_id = $1 AND status = 'VALID'",
            )
            .bind(event_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;

            outcome.events_completed += 1;
            outcome.tickets_expired += expired.rows_affected();
        }
        Ok(outcome)
    }
}
