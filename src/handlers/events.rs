use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::{Event, EventStatus};
use crate::routes::AppState;
use crate::utils::response::{created, success};
use crate::utils::AppError;

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub capacity: i32,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

pub async fn create_event(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    if body.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if body.capacity < 0 {
        return Err(AppError::Validation(
            "Capacity cannot be negative".to_string(),
        ));
    }
    if body.end_date <= body.start_date {
        return Err(AppError::Validation(
            "End date must be after start date".to_string(),
        ));
    }

    let now = Utc::now();
    let event = state
        .store
        .create_event(Event {
            id: Uuid::new_v4(),
            organizer_id: user.id,
            title: body.title,
            description: body.description,
            location: body.location,
            capacity: body.capacity,
            status: EventStatus::Draft,
            start_date: body.start_date,
            end_date: body.end_date,
            created_at: now,
            updated_at: now,
        })
        .await?;
    Ok(created(event, "Event created"))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let event = state
        .store
        .event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Ok(success(event, "Event retrieved"))
}

#[derive(Deserialize)]
pub struct UpdateCapacityRequest {
    pub capacity: i32,
}

pub async fn update_capacity(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateCapacityRequest>,
) -> Result<Response, AppError> {
    if body.capacity < 0 {
        return Err(AppError::Validation(
            "Capacity cannot be negative".to_string(),
        ));
    }
    let event = state
        .store
        .event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if !user.can_manage(event.organizer_id) {
        return Err(AppError::Forbidden(
            "Not authorized to update this event".to_string(),
        ));
    }

    let event = state.store.update_event_capacity(id, body.capacity).await?;
    Ok(success(event, "Capacity updated"))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: EventStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Response, AppError> {
    let event = state
        .store
        .event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if !user.can_manage(event.organizer_id) {
        return Err(AppError::Forbidden(
            "Not authorized to update this event".to_string(),
        ));
    }

    let event = state.store.update_event_status(id, body.status).await?;
    Ok(success(event, "Event status updated"))
}
