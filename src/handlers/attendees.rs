use axum::extract::{Path, State};
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::routes::AppState;
use crate::services::checkin;
use crate::utils::response::success;
use crate::utils::AppError;

async fn authorize_for_event(
    state: &AppState,
    user: &CurrentUser,
    event_id: Uuid,
) -> Result<(), AppError> {
    let event = state
        .store
        .event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if !user.can_manage(event.organizer_id) {
        return Err(AppError::Forbidden(
            "Not authorized to manage attendees for this event".to_string(),
        ));
    }
    Ok(())
}

pub async fn list_attendees(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    authorize_for_event(&state, &user, event_id).await?;
    let attendees = state.store.assignees_for_event(event_id).await?;
    Ok(success(attendees, "Attendees retrieved"))
}

pub async fn check_in(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((event_id, assignee_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, AppError> {
    authorize_for_event(&state, &user, event_id).await?;
    let assignee = checkin::check_in(
        state.store.as_ref(),
        state.notifier.clone(),
        event_id,
        assignee_id,
        Utc::now(),
    )
    .await?;
    Ok(success(assignee, "Attendee checked in"))
}
