pub mod assignee;
pub mod event;
pub mod ticket;
pub mod user;

pub use assignee::{AssignTarget, TicketAssignee};
pub use event::{Event, EventStatus};
pub use ticket::{Ticket, TicketStatus, TicketType};
pub use user::User;
