use std::fmt::Display;

use crate::core::time::{DateTime, Duration};
use crate::core::trend::TrendTracker;
use crate::core::unit::DegreeCelsius;
use crate::t;

use super::Preset;

/// Full suppression value when heating must stop.
const MIN_OFFSET: i32 = -10;
const MAX_OFFSET: i32 = 10;

/// Why a rule contributed to the applied offset. Every delta is tagged so the
/// final value can be explained in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustReason {
    StopHeating,
    PeakHour,
    TempDiff,
    Extremes,
    Trend,
    KeepCompressorRunning,
    Derate,
}

impl Display for AdjustReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AdjustReason::StopHeating => "stop-heating",
            AdjustReason::PeakHour => "peak-hour",
            AdjustReason::TempDiff => "tempdiff",
            AdjustReason::Extremes => "extremes",
            AdjustReason::Trend => "trend",
            AdjustReason::KeepCompressorRunning => "keep-compressor-running",
            AdjustReason::Derate => "derate",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOffset {
    pub value: i32,
    pub deltas: Vec<(AdjustReason, i32)>,
}

pub struct ComfortInput<'a> {
    pub raw_offset: i32,
    pub indoor_temp: DegreeCelsius,
    pub target_temp: DegreeCelsius,
    /// All indoor sensors that have reported, for the extremes correction.
    pub sensor_temps: &'a [DegreeCelsius],
    pub indoor_trend: &'a TrendTracker,
    pub degree_minutes_trend: &'a TrendTracker,
    pub is_peak_hour: bool,
    pub outdoor_temp: DegreeCelsius,
    pub preset: Preset,
    pub heating_active: bool,
    pub grid_peak_warning: bool,
    pub addon_heater_active: bool,
}

/// Combines the raw schedule offset with live temperature, trend and override
/// signals into the offset actually applied for the current hour. All calls
/// are serialized by the coordinator's single-writer lock.
pub struct ComfortAdjuster {
    stop_heating_temp: DegreeCelsius,
    derate_cooldown: Duration,
    last_derate: Option<DateTime>,
    last_applied: Option<i32>,
}

impl ComfortAdjuster {
    pub fn new(stop_heating_temp: DegreeCelsius) -> Self {
        Self {
            stop_heating_temp,
            derate_cooldown: t!(30 minutes),
            last_derate: None,
            last_applied: None,
        }
    }

    /// `None` when the summed result equals the previously applied offset;
    /// recomputation is an idempotent no-op in that case.
    pub fn apply_comfort(&mut self, input: &ComfortInput) -> Option<AppliedOffset> {
        let applied = self.evaluate(input);

        if self.last_applied == Some(applied.value) {
            return None;
        }

        self.last_applied = Some(applied.value);
        Some(applied)
    }

    fn evaluate(&mut self, input: &ComfortInput) -> AppliedOffset {
        //heating fully suppressed, nothing else matters
        if input.outdoor_temp >= self.stop_heating_temp {
            return AppliedOffset {
                value: MIN_OFFSET,
                deltas: vec![(AdjustReason::StopHeating, MIN_OFFSET)],
            };
        }

        if input.is_peak_hour && input.indoor_temp >= input.target_temp {
            return AppliedOffset {
                value: MIN_OFFSET,
                deltas: vec![(AdjustReason::PeakHour, MIN_OFFSET)],
            };
        }

        let band = input.preset.comfort_band();
        let mut deltas = Vec::new();

        let tempdiff = tempdiff_correction((input.indoor_temp - input.target_temp).0, band.over, band.under);
        deltas.push((AdjustReason::TempDiff, tempdiff));

        let extremes = extremes_correction(input.target_temp, input.sensor_temps, band.over, band.under);
        deltas.push((AdjustReason::Extremes, extremes));

        let trend = trend_correction(input.indoor_trend, input.indoor_temp, input.target_temp);
        deltas.push((AdjustReason::Trend, trend));

        if keeps_compressor_running(input) {
            deltas.push((AdjustReason::KeepCompressorRunning, 1));
        }

        if let Some(derate) = self.derate(input) {
            deltas.push((AdjustReason::Derate, derate));
        }

        let sum: i32 = deltas.iter().map(|(_, d)| d).sum();
        let value = (input.raw_offset + sum).clamp(MIN_OFFSET, MAX_OFFSET);

        AppliedOffset { value, deltas }
    }

    /// Load-management de-rate, rate-limited so a flapping signal does not
    /// re-trigger every cycle.
    fn derate(&mut self, input: &ComfortInput) -> Option<i32> {
        if !input.grid_peak_warning && !input.addon_heater_active {
            return None;
        }

        if let Some(last) = self.last_derate
            && last.elapsed() < self.derate_cooldown
        {
            return None;
        }

        self.last_derate = Some(t!(now));
        Some(if input.grid_peak_warning { -2 } else { -1 })
    }
}

/// Larger positive diff (too warm) yields a larger negative correction. The
/// band is asymmetric: overshoot is corrected sooner than undershoot.
fn tempdiff_correction(diff: f64, over_band: f64, under_band: f64) -> i32 {
    let band = if diff > 0.0 { over_band } else { under_band };
    if band == 0.0 {
        return 0;
    }

    -((diff / band).floor() as i32)
}

/// Coldest-room deviation against hottest-room deviation; whichever magnitude
/// dominates sets the direction, reduced by the relevant band and never
/// pushed past zero.
fn extremes_correction(target: DegreeCelsius, sensors: &[DegreeCelsius], over_band: f64, under_band: f64) -> i32 {
    if sensors.is_empty() {
        return 0;
    }

    let deviations: Vec<f64> = sensors.iter().map(|temp| (target - *temp).0).collect();

    let coldest = deviations.iter().cloned().fold(f64::MIN, f64::max).max(0.0);
    let hottest = deviations.iter().cloned().fold(f64::MAX, f64::min).min(0.0);

    if coldest >= hottest.abs() {
        (coldest - under_band).max(0.0).round() as i32
    } else {
        -((hottest.abs() - over_band).max(0.0).round() as i32)
    }
}

/// Anticipates drift instead of reacting to it: compares the predicted indoor
/// temperature half an hour ahead against the target. Contributes nothing
/// until the tracker has enough history.
fn trend_correction(trend: &TrendTracker, indoor: DegreeCelsius, target: DegreeCelsius) -> i32 {
    if !trend.is_clean() {
        return 0;
    }

    let predicted = indoor.0 + trend.gradient() / 2.0;
    -((predicted - target.0).round() as i32)
}

/// Favor efficiency over price: avoid short-cycling when degree-minutes are
/// about to run out while it is freezing outside.
fn keeps_compressor_running(input: &ComfortInput) -> bool {
    if !input.heating_active || input.outdoor_temp.0 >= 0.0 {
        return false;
    }

    match input.degree_minutes_trend.predicted_time_at_value(0.0) {
        Some(at) => at <= t!(in 1 hours) && at >= t!(now),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::FIXED_NOW;

    fn stale_tracker() -> TrendTracker {
        TrendTracker::new(10, Duration::hours(2), 2)
    }

    fn input<'a>(indoor: &'a TrendTracker, dm: &'a TrendTracker) -> ComfortInput<'a> {
        ComfortInput {
            raw_offset: 0,
            indoor_temp: DegreeCelsius(20.0),
            target_temp: DegreeCelsius(20.0),
            sensor_temps: &[],
            indoor_trend: indoor,
            degree_minutes_trend: dm,
            is_peak_hour: false,
            outdoor_temp: DegreeCelsius(2.0),
            preset: Preset::Normal,
            heating_active: true,
            grid_peak_warning: false,
            addon_heater_active: false,
        }
    }

    #[test]
    fn warm_outdoor_forces_minimum_offset() {
        let (indoor, dm) = (stale_tracker(), stale_tracker());
        let mut adjuster = ComfortAdjuster::new(DegreeCelsius(13.0));

        let mut input = input(&indoor, &dm);
        input.raw_offset = 3;
        input.outdoor_temp = DegreeCelsius(14.5);

        let applied = adjuster.apply_comfort(&input).unwrap();
        assert_eq!(applied.value, -10);
        assert_eq!(applied.deltas, vec![(AdjustReason::StopHeating, -10)]);
    }

    #[test]
    fn peak_hour_suppresses_heating_unless_below_target() {
        let (indoor, dm) = (stale_tracker(), stale_tracker());
        let mut adjuster = ComfortAdjuster::new(DegreeCelsius(13.0));

        let mut warm = input(&indoor, &dm);
        warm.is_peak_hour = true;
        warm.indoor_temp = DegreeCelsius(20.4);

        let applied = adjuster.apply_comfort(&warm).unwrap();
        assert_eq!(applied.value, -10);
        assert_eq!(applied.deltas[0].0, AdjustReason::PeakHour);

        //below target, the peak does not short-circuit
        let mut cold = input(&indoor, &dm);
        cold.is_peak_hour = true;
        cold.indoor_temp = DegreeCelsius(19.0);

        let applied = adjuster.apply_comfort(&cold).unwrap();
        assert!(applied.value > -10);
    }

    #[test]
    fn too_warm_yields_negative_correction() {
        //0.7 over target with a 0.3 over-band
        assert_eq!(tempdiff_correction(0.7, 0.3, 0.6), -2);
    }

    #[test]
    fn too_cold_yields_positive_correction() {
        //-0.8 against a 0.6 under-band: floor(-1.33) = -2, flipped
        assert_eq!(tempdiff_correction(-0.8, 0.3, 0.6), 2);
    }

    #[test]
    fn extremes_follow_the_dominant_deviation() {
        let target = DegreeCelsius(20.0);
        //coldest room 2.6 below target dominates the 0.5-warm room
        let sensors = [DegreeCelsius(17.4), DegreeCelsius(20.5), DegreeCelsius(20.0)];
        assert_eq!(extremes_correction(target, &sensors, 0.3, 0.6), 2);

        //hottest room dominates
        let sensors = [DegreeCelsius(22.4), DegreeCelsius(19.9)];
        assert_eq!(extremes_correction(target, &sensors, 0.3, 0.6), -2);
    }

    #[test]
    fn extremes_never_overcorrect_past_zero() {
        let target = DegreeCelsius(20.0);
        //0.4 cold, below the 0.6 under-band
        let sensors = [DegreeCelsius(19.6)];
        assert_eq!(extremes_correction(target, &sensors, 0.3, 0.6), 0);
    }

    #[test]
    fn trend_correction_waits_for_clean_tracker() {
        let tracker = stale_tracker();
        assert_eq!(trend_correction(&tracker, DegreeCelsius(22.0), DegreeCelsius(20.0)), 0);
    }

    #[tokio::test]
    async fn trend_correction_opposes_predicted_drift() {
        let t0 = DateTime::from_iso("2024-01-26T12:00:00+01:00").unwrap();

        let mut tracker = FIXED_NOW.scope(t0, async { stale_tracker() }).await;
        tracker.add_reading(20.0, t0);
        tracker.add_reading(22.0, t0 + Duration::hours(1));

        let correction = FIXED_NOW
            .scope(t0 + Duration::hours(1), async {
                //rising 2 degrees per hour, predicted half-hour overshoot of 1
                trend_correction(&tracker, DegreeCelsius(20.0), DegreeCelsius(20.0))
            })
            .await;

        assert_eq!(correction, -1);
    }

    #[tokio::test]
    async fn compressor_bonus_when_degree_minutes_reach_zero_soon() {
        let t0 = DateTime::from_iso("2024-01-26T12:00:00+01:00").unwrap();

        let mut dm = stale_tracker();
        dm.add_reading(-100.0, t0 - Duration::hours(1));
        dm.add_reading(-50.0, t0);

        let indoor = stale_tracker();

        FIXED_NOW
            .scope(t0, async {
                let mut freezing = input(&indoor, &dm);
                freezing.outdoor_temp = DegreeCelsius(-5.0);
                assert!(keeps_compressor_running(&freezing));

                //not heating, no bonus
                let mut idle = input(&indoor, &dm);
                idle.outdoor_temp = DegreeCelsius(-5.0);
                idle.heating_active = false;
                assert!(!keeps_compressor_running(&idle));

                //mild outside, no bonus
                let mild = input(&indoor, &dm);
                assert!(!keeps_compressor_running(&mild));
            })
            .await;
    }

    #[test]
    fn derate_is_rate_limited() {
        let (indoor, dm) = (stale_tracker(), stale_tracker());
        let mut adjuster = ComfortAdjuster::new(DegreeCelsius(13.0));

        let mut breached = input(&indoor, &dm);
        breached.grid_peak_warning = true;

        let first = adjuster.apply_comfort(&breached).unwrap();
        assert!(first.deltas.contains(&(AdjustReason::Derate, -2)));

        //within the cooldown the de-rate does not re-trigger
        let second = adjuster.apply_comfort(&breached).unwrap();
        assert!(!second.deltas.iter().any(|(r, _)| *r == AdjustReason::Derate));
    }

    #[test]
    fn unchanged_result_is_a_no_op() {
        let (indoor, dm) = (stale_tracker(), stale_tracker());
        let mut adjuster = ComfortAdjuster::new(DegreeCelsius(13.0));

        let balanced = input(&indoor, &dm);

        assert!(adjuster.apply_comfort(&balanced).is_some());
        assert!(adjuster.apply_comfort(&balanced).is_none());
    }
}
