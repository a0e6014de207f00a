use std::sync::Arc;

use axum::async_trait;
use uuid::Uuid;

/// Events the engine announces. Delivery (email templates, websocket rooms)
/// lives outside the core; this is the boundary it fires across.
#[derive(Debug, Clone)]
pub enum Notification {
    TicketsConfirmed {
        purchaser_id: Uuid,
        event_id: Uuid,
        reference: String,
        ticket_count: usize,
    },
    TicketsCancelled {
        purchaser_id: Uuid,
        event_id: Uuid,
        reference: String,
        ticket_count: usize,
    },
    TicketAssigned {
        event_id: Uuid,
        ticket_id: Uuid,
        assignee_email: Option<String>,
        assignee_user_id: Option<Uuid>,
    },
    AttendeeCheckedIn {
        event_id: Uuid,
        assignee_id: Uuid,
    },
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, notification: Notification);
}

/// Fire-and-forget: the request path never awaits delivery.
pub fn dispatch(dispatcher: Arc<dyn NotificationDispatcher>, notification: Notification) {
    tokio::spawn(async move {
        dispatcher.notify(notification).await;
    });
}

/// Default dispatcher: structured log lines in place of real delivery.
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn notify(&self, notification: Notification) {
        tracing::info!(notification = ?notification, "notification dispatched");
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Records notifications for assertions.
    #[derive(Default)]
    pub struct RecordingDispatcher {
        pub seen: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationDispatcher for RecordingDispatcher {
        async fn notify(&self, notification: Notification) {
            self.seen.lock().await.push(notification);
        }
    }
}
