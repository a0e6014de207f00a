pub mod assignment;
pub mod capacity;
pub mod checkin;
pub mod reservation;
pub mod settlement;
pub mod sweep;
