mod comfort;
mod ventilation;

pub use comfort::{ComfortAdjuster, ComfortInput};
pub use ventilation::VentilationRule;

use serde::{Deserialize, Serialize};

use crate::core::unit::DegreeCelsius;

/// Comfort mode. Each preset maps to an asymmetric comfort band (narrow when
/// over temperature, wide when under), a setpoint delta and a hot-water limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    #[default]
    Normal,
    Eco,
    Away,
    ExtendedAway,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComfortBand {
    /// Allowed overshoot above target before corrections kick in.
    pub over: f64,
    /// Allowed undershoot below target.
    pub under: f64,
}

impl Preset {
    pub fn comfort_band(&self) -> ComfortBand {
        match self {
            Preset::Normal => ComfortBand { over: 0.3, under: 0.6 },
            Preset::Eco => ComfortBand { over: 0.5, under: 0.8 },
            Preset::Away => ComfortBand { over: 0.5, under: 1.0 },
            Preset::ExtendedAway => ComfortBand { over: 0.7, under: 1.2 },
        }
    }

    pub fn setpoint_delta(&self) -> DegreeCelsius {
        match self {
            Preset::Normal => DegreeCelsius(0.0),
            Preset::Eco => DegreeCelsius(-0.5),
            Preset::Away => DegreeCelsius(-1.5),
            Preset::ExtendedAway => DegreeCelsius(-2.0),
        }
    }

    /// Water temperature below which a boost becomes a candidate.
    pub fn water_limit(&self) -> DegreeCelsius {
        match self {
            Preset::Normal | Preset::Eco => DegreeCelsius(40.0),
            Preset::Away | Preset::ExtendedAway => DegreeCelsius(30.0),
        }
    }
}

/// Maximum allowed offset magnitude, derived from user config and reduced in
/// severe cold so the heating curve is not pushed around while the pump is
/// already at its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tolerance {
    base: u32,
}

impl Tolerance {
    const COLD_THRESHOLD: f64 = -7.0;
    const VERY_COLD_THRESHOLD: f64 = -15.0;

    pub fn new(base: u32) -> Self {
        Self { base: base.min(10) }
    }

    pub fn effective(&self, outdoor: DegreeCelsius) -> u32 {
        let reduction = if outdoor.0 <= Self::VERY_COLD_THRESHOLD {
            2
        } else if outdoor.0 <= Self::COLD_THRESHOLD {
            1
        } else {
            0
        };

        self.base.saturating_sub(reduction).min(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_is_reduced_in_cold_weather() {
        let tolerance = Tolerance::new(3);

        assert_eq!(tolerance.effective(DegreeCelsius(5.0)), 3);
        assert_eq!(tolerance.effective(DegreeCelsius(-7.0)), 2);
        assert_eq!(tolerance.effective(DegreeCelsius(-15.0)), 1);
    }

    #[test]
    fn tolerance_never_goes_negative_or_above_ten() {
        assert_eq!(Tolerance::new(1).effective(DegreeCelsius(-20.0)), 0);
        assert_eq!(Tolerance::new(99).effective(DegreeCelsius(5.0)), 10);
    }

    #[test]
    fn over_band_is_narrower_than_under_band() {
        for preset in [Preset::Normal, Preset::Eco, Preset::Away, Preset::ExtendedAway] {
            let band = preset.comfort_band();
            assert!(band.over < band.under);
        }
    }
}
