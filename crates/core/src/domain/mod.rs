pub mod booking;
pub mod lead;
pub mod turn;
