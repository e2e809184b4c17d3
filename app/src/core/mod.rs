pub mod time;
pub mod trend;
pub mod unit;
