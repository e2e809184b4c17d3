use crate::core::trend::TrendTracker;
use crate::core::unit::DegreeCelsius;

use super::Preset;

/// Overshoot beyond the over-band before ventilation is worth it.
const OVERSHOOT_MARGIN: f64 = 1.0;
/// Rising faster than this counts as a sustained upward drift.
const RISING_GRADIENT: f64 = 0.1;
/// Below this outdoor temperature venting wastes more heat than it removes.
const MIN_OUTDOOR: f64 = 10.0;

/// Boolean sibling of the comfort rules: request a ventilation boost while
/// the room overshoots its band and keeps rising, but only in mild weather.
pub struct VentilationRule {
    last: Option<bool>,
}

impl VentilationRule {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// `Some` only when the decision changed since the last evaluation.
    pub fn evaluate(
        &mut self,
        indoor: DegreeCelsius,
        target: DegreeCelsius,
        trend: &TrendTracker,
        outdoor: DegreeCelsius,
        preset: Preset,
    ) -> Option<bool> {
        let band = preset.comfort_band();

        let overshooting = (indoor - target).0 > band.over + OVERSHOOT_MARGIN;
        let rising = trend.is_clean() && trend.gradient() > RISING_GRADIENT;
        let mild_outside = outdoor.0 >= MIN_OUTDOOR;

        let boost = overshooting && rising && mild_outside;

        if self.last == Some(boost) {
            return None;
        }

        self.last = Some(boost);
        Some(boost)
    }
}

impl Default for VentilationRule {
    fn default() -> Self {
        Self::new()
    }
}
