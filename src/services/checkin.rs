use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::TicketAssignee;
use crate::notify::{dispatch, Notification, NotificationDispatcher};
use crate::store::Store;
use crate::utils::AppError;

/// Check an assignee in at the door. Runs only while the event is in
/// progress; the attendance stamp and the ticket's VALID -> USED transition
/// land atomically in the store.
pub async fn check_in(
    store: &dyn Store,
    notifier: Arc<dyn NotificationDispatcher>,
    event_id: Uuid,
    assignee_id: Uuid,
    now: DateTime<Utc>,
) -> Result<TicketAssignee, AppError> {
    let event = store
        .event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let assignee = store
        .assignee(assignee_id)
        .await?
        .filter(|a| a.event_id == event_id)
        .ok_or_else(|| AppError::NotFound("Assignee not found for this event".to_string()))?;

    if now < event.start_date {
        return Err(AppError::Conflict(
            "Check-in has not opened yet".to_string(),
        ));
    }
    if now > event.end_date {
        return Err(AppError::Conflict("The event has ended".to_string()));
    }
    if assignee.checked_in() {
        return Err(AppError::AlreadyCheckedIn(
            "Attendee has already checked in".to_string(),
        ));
    }

    let assignee = store.check_in(assignee_id, now).await?;

    dispatch(
        notifier,
        Notification::AttendeeCheckedIn {
            event_id,
            assignee_id,
        },
    );
    Ok(assignee)
}
