use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::{Event, TicketType};
use crate::routes::AppState;
use crate::store::TicketTypePatch;
use crate::utils::response::{created, success};
use crate::utils::AppError;

#[derive(Deserialize)]
pub struct CreateTicketTypeRequest {
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub max_per_user: i32,
    pub sale_start_date: DateTime<Utc>,
    pub sale_end_date: DateTime<Utc>,
}

async fn managed_event(state: &AppState, user: &CurrentUser, id: Uuid) -> Result<Event, AppError> {
    let event = state
        .store
        .event(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if !user.can_manage(event.organizer_id) {
        return Err(AppError::Forbidden(
            "Not authorized to manage ticket types for this event".to_string(),
        ));
    }
    Ok(event)
}

pub async fn create_ticket_type(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(event_id): Path<Uuid>,
    Json(body): Json<CreateTicketTypeRequest>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &user, event_id).await?;

    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }
    if body.quantity < 0 {
        return Err(AppError::Validation(
            "Quantity cannot be negative".to_string(),
        ));
    }
    if body.max_per_user < 1 {
        return Err(AppError::Validation(
            "max_per_user must be at least 1".to_string(),
        ));
    }
    if body.price < Decimal::ZERO {
        return Err(AppError::Validation("Price cannot be negative".to_string()));
    }
    if body.sale_end_date <= body.sale_start_date {
        return Err(AppError::Validation(
            "Sale end must be after sale start".to_string(),
        ));
    }
    if body.sale_end_date > event.start_date {
        return Err(AppError::Validation(
            "Ticket sales must end before the event starts".to_string(),
        ));
    }

    let now = Utc::now();
    let ticket_type = state
        .store
        .create_ticket_type(TicketType {
            id: Uuid::new_v4(),
            event_id,
            name: body.name,
            price: body.price,
            remaining_quantity: body.quantity,
            max_per_user: body.max_per_user,
            sale_start_date: body.sale_start_date,
            sale_end_date: body.sale_end_date,
            created_at: now,
            updated_at: now,
        })
        .await?;
    Ok(created(ticket_type, "Ticket type created"))
}

pub async fn list_ticket_types(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Response, AppError> {
    if state.store.event(event_id).await?.is_none() {
        return Err(AppError::NotFound("Event not found".to_string()));
    }
    let ticket_types = state.store.ticket_types_for_event(event_id).await?;
    Ok(success(ticket_types, "Ticket types retrieved"))
}

#[derive(Deserialize)]
pub struct UpdateTicketTypeRequest {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub max_per_user: Option<i32>,
    pub sale_start_date: Option<DateTime<Utc>>,
    pub sale_end_date: Option<DateTime<Utc>>,
}

pub async fn update_ticket_type(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((event_id, type_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<UpdateTicketTypeRequest>,
) -> Result<Response, AppError> {
    let event = managed_event(&state, &user, event_id).await?;

    let existing = state
        .store
        .ticket_type(type_id)
        .await?
        .filter(|t| t.event_id == event_id)
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

    if let Some(quantity) = body.quantity {
        if quantity < 0 {
            return Err(AppError::Validation(
                "Quantity cannot be negative".to_string(),
            ));
        }
    }
    if let Some(max_per_user) = body.max_per_user {
        if max_per_user < 1 {
            return Err(AppError::Validation(
                "max_per_user must be at least 1".to_string(),
            ));
        }
    }
    let sale_end = body.sale_end_date.unwrap_or(existing.sale_end_date);
    if sale_end > event.start_date {
        return Err(AppError::Validation(
            "Ticket sales must end before the event starts".to_string(),
        ));
    }

    let updated = state
        .store
        .update_ticket_type(
            type_id,
            TicketTypePatch {
                name: body.name,
                price: body.price,
                remaining_quantity: body.quantity,
                max_per_user: body.max_per_user,
                sale_start_date: body.sale_start_date,
                sale_end_date: body.sale_end_date,
            },
        )
        .await?;
    Ok(success(updated, "Ticket type updated"))
}
