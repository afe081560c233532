pub mod booking;
pub mod datetime;
