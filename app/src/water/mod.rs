mod cycle;
mod scheduler;

pub use cycle::WaterBoostRunner;
pub use scheduler::{BoostQuery, next_start};

use serde::{Deserialize, Serialize};

use crate::core::time::{DateTime, Duration};
use crate::core::unit::DegreeCelsius;

/// Discretized severity of the hot-water deficit, derived from the gap to the
/// target temperature. Sizes the boost duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Demand {
    NoDemand,
    LowDemand,
    MediumDemand,
    HighDemand,
    ErrorDemand,
}

impl Demand {
    pub fn from_temperature_gap(gap: DegreeCelsius) -> Self {
        if gap.0.is_nan() {
            return Demand::ErrorDemand;
        }

        match gap.0 {
            g if g <= 0.0 => Demand::NoDemand,
            g if g <= 5.0 => Demand::LowDemand,
            g if g <= 10.0 => Demand::MediumDemand,
            _ => Demand::HighDemand,
        }
    }

    pub fn boost_duration(&self) -> Duration {
        match self {
            Demand::NoDemand | Demand::ErrorDemand => Duration::zero(),
            Demand::LowDemand => Duration::minutes(20),
            Demand::MediumDemand => Duration::minutes(30),
            Demand::HighDemand => Duration::minutes(40),
        }
    }
}

/// Predicted start of the next boost with its target temperature and the
/// demand-sized duration of the cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostPlan {
    pub at: DateTime,
    pub target_temp: DegreeCelsius,
    pub duration: Duration,
}

/// Everything the water-heating side tracks between recomputations. Mutated
/// only by the scheduler, read-only to everyone else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaterBoostState {
    pub current_temp: DegreeCelsius,
    /// Water temperature trend in °C/hour, clamped to ≥ -0.5 on update.
    pub trend_per_hour: f64,
    pub latest_boost: Option<DateTime>,
    pub next_start: Option<BoostPlan>,
}

impl WaterBoostState {
    pub fn with_trend(mut self, trend_per_hour: f64) -> Self {
        self.trend_per_hour = trend_per_hour.max(-0.5);
        self
    }
}
