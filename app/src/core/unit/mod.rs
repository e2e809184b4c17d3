mod degree_celsius;
mod degree_minutes;
mod price;

pub use degree_celsius::DegreeCelsius;
pub use degree_minutes::DegreeMinutes;
pub use price::EuroPerKwh;
