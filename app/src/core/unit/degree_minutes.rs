use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Accumulated compressor heating deficit. More negative means the compressor
/// has more work queued; 0 means it is about to stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct DegreeMinutes(pub f64);

impl From<f64> for DegreeMinutes {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<DegreeMinutes> for f64 {
    fn from(value: DegreeMinutes) -> Self {
        value.0
    }
}

impl Display for DegreeMinutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.0} DM", self.0)
    }
}
