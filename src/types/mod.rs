pub mod grid;
pub mod reading;
pub mod station;
