use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::{AssignTarget, Ticket};
use crate::routes::AppState;
use crate::services::{assignment, reservation, settlement};
use crate::store::ReservationLine;
use crate::utils::response::{created, empty_success, success};
use crate::utils::AppError;

#[derive(Deserialize)]
pub struct PurchaseBody {
    pub event_id: Uuid,
    pub tickets: Vec<PurchaseLine>,
}

#[derive(Deserialize)]
pub struct PurchaseLine {
    pub ticket_type_id: Uuid,
    pub quantity: u32,
}

#[derive(Serialize)]
struct PurchasePayload {
    tickets: Vec<Ticket>,
    authorization_url: String,
    reference: String,
}

pub async fn purchase(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<PurchaseBody>,
) -> Result<Response, AppError> {
    let request = reservation::PurchaseRequest {
        event_id: body.event_id,
        lines: body
            .tickets
            .iter()
            .map(|l| ReservationLine {
                ticket_type_id: l.ticket_type_id,
                quantity: l.quantity,
            })
            .collect(),
    };

    let outcome = reservation::purchase(
        state.store.as_ref(),
        state.gateway.as_ref(),
        user.id,
        &request,
        &state.currency,
        Utc::now(),
    )
    .await?;

    Ok(created(
        PurchasePayload {
            tickets: outcome.tickets,
            authorization_url: outcome.authorization_url,
            reference: outcome.reference,
        },
        "Reservation created, complete payment to confirm",
    ))
}

#[derive(Deserialize)]
pub struct VerifyParams {
    pub reference: String,
}

pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Response, AppError> {
    let outcome = settlement::reconcile(
        state.store.as_ref(),
        state.gateway.as_ref(),
        state.notifier.clone(),
        &params.reference,
    )
    .await?;

    match outcome {
        settlement::SettlementOutcome::Confirmed { .. } => {
            Ok(empty_success("Payment verified successfully"))
        }
        settlement::SettlementOutcome::AlreadySettled => {
            Ok(empty_success("Payment already settled"))
        }
        settlement::SettlementOutcome::PaymentPending => Err(AppError::PaymentPending(
            "Payment is still pending, retry later".to_string(),
        )),
        settlement::SettlementOutcome::Cancelled { .. } => Err(AppError::PaymentFailed(
            "Payment verification failed".to_string(),
        )),
    }
}

pub async fn my_tickets(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Response, AppError> {
    let tickets = state.store.tickets_for_user(user.id).await?;
    Ok(success(tickets, "Tickets retrieved"))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let ticket = state
        .store
        .ticket(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))?;
    if ticket.purchaser_id != user.id && !user.is_admin() {
        return Err(AppError::Forbidden("Not authorized".to_string()));
    }
    Ok(success(ticket, "Ticket retrieved"))
}

#[derive(Deserialize)]
pub struct AssignBody {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub async fn assign(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(ticket_id): Path<Uuid>,
    Json(body): Json<AssignBody>,
) -> Result<Response, AppError> {
    let target = match (body.user_id, body.email) {
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "Provide either user_id or email, not both".to_string(),
            ))
        }
        (Some(user_id), None) => AssignTarget::User(user_id),
        (None, Some(email)) => AssignTarget::Guest {
            email,
            first_name: body.first_name,
            last_name: body.last_name,
        },
        (None, None) => {
            return Err(AppError::Validation(
                "Provide a user_id or an email".to_string(),
            ))
        }
    };

    let assignee = assignment::assign(
        state.store.as_ref(),
        state.notifier.clone(),
        user.id,
        ticket_id,
        target,
    )
    .await?;
    Ok(created(assignee, "Ticket assigned"))
}

pub async fn unassign(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(ticket_id): Path<Uuid>,
) -> Result<Response, AppError> {
    assignment::unassign(state.store.as_ref(), user.id, ticket_id).await?;
    Ok(empty_success("Assignee removed"))
}
