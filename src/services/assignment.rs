use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::models::{AssignTarget, TicketAssignee, TicketStatus};
use crate::notify::{dispatch, Notification, NotificationDispatcher};
use crate::store::Store;
use crate::utils::AppError;

/// Bind an attendee identity to a purchased ticket. The purchaser stays the
/// owner; the assignee is who walks through the door.
pub async fn assign(
    store: &dyn Store,
    notifier: Arc<dyn NotificationDispatcher>,
    caller_id: Uuid,
    ticket_id: Uuid,
    target: AssignTarget,
) -> Result<TicketAssignee, AppError> {
    if let AssignTarget::Guest { email, .. } = &target {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AppError::Validation(
                "A valid email is required for guest assignees".to_string(),
            ));
        }
    }

    let ticket = store
        .ticket(ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    if ticket.purchaser_id != caller_id {
        return Err(AppError::Forbidden(
            "Only the purchaser can assign this ticket".to_string(),
        ));
    }
    if ticket.status != TicketStatus::Valid {
        return Err(AppError::InvalidState(format!(
            "only VALID tickets can be assigned, this one is {:?}",
            ticket.status
        )));
    }

    if store.assignee_for_ticket(ticket_id).await?.is_some() {
        return Err(AppError::Conflict(
            "Ticket already has an assignee".to_string(),
        ));
    }
    if store.assignment_exists(ticket.event_id, &target).await? {
        return Err(AppError::Conflict(
            "Attendee already holds a ticket for this event".to_string(),
        ));
    }

    let (user_id, email, first_name, last_name) = match target {
        AssignTarget::User(user_id) => (Some(user_id), None, None, None),
        AssignTarget::Guest {
            email,
            first_name,
            last_name,
        } => (None, Some(email), first_name, last_name),
    };

    let assignee = store
        .create_assignee(TicketAssignee {
            id: Uuid::new_v4(),
            ticket_id,
            event_id: ticket.event_id,
            user_id,
            email,
            first_name,
            last_name,
            attended_at: None,
            created_at: Utc::now(),
        })
        .await?;

    dispatch(
        notifier,
        Notification::TicketAssigned {
            event_id: assignee.event_id,
            ticket_id,
            assignee_email: assignee.email.clone(),
            assignee_user_id: assignee.user_id,
        },
    );
    Ok(assignee)
}

/// Remove a ticket's assignee. The ticket's status is untouched.
pub async fn unassign(
    store: &dyn Store,
    caller_id: Uuid,
    ticket_id: Uuid,
) -> Result<(), AppError> {
    let ticket = store
        .ticket(ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    if ticket.purchaser_id != caller_id {
        return Err(AppError::Forbidden(
            "Only the purchaser can unassign this ticket".to_string(),
        ));
    }
    if !store.delete_assignee(ticket_id).await? {
        return Err(AppError::NotFound(
            "Ticket has no assignee".to_string(),
        ));
    }
    Ok(())
}
