use std::sync::Arc;

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::config::create_cors_layer;
use crate::handlers::{attendees, events, health_check, ticket_types, tickets};
use crate::notify::NotificationDispatcher;
use crate::payments::PaymentGateway;
use crate::store::Store;

/// Shared state, cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub currency: String,
}

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(events::create_event))
        .route("/events/:id", get(events::get_event))
        .route("/events/:id/capacity", patch(events::update_capacity))
        .route("/events/:id/status", patch(events::update_status))
        .route(
            "/events/:id/ticket-types",
            post(ticket_types::create_ticket_type).get(ticket_types::list_ticket_types),
        )
        .route(
            "/events/:id/ticket-types/:type_id",
            patch(ticket_types::update_ticket_type),
        )
        .route("/events/:id/attendees", get(attendees::list_attendees))
        .route(
            "/events/:id/attendees/:assignee_id/check-in",
            post(attendees::check_in),
        )
        .route("/tickets/purchase", post(tickets::purchase))
        .route("/tickets/verify", get(tickets::verify))
        .route("/tickets", get(tickets::my_tickets))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/tickets/:id/assign", post(tickets::assign))
        .route("/tickets/:id/assignee", delete(tickets::unassign))
        .layer(create_cors_layer())
        .with_state(state)
}
