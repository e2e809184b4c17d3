use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct EuroPerKwh(pub f64);

impl From<f64> for EuroPerKwh {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<EuroPerKwh> for f64 {
    fn from(value: EuroPerKwh) -> Self {
        value.0
    }
}

impl From<&EuroPerKwh> for f64 {
    fn from(value: &EuroPerKwh) -> Self {
        value.0
    }
}

impl Display for EuroPerKwh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4} €/kWh", self.0)
    }
}
