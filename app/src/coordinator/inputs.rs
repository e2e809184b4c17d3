use tokio::sync::broadcast;

use crate::core::time::Duration;
use crate::core::trend::TrendTracker;
use crate::core::unit::{DegreeCelsius, DegreeMinutes};
use crate::heating::Preset;
use crate::pricing::PriceSeries;
use crate::t;

/// Everything the ingestion side can tell the core, as plain data. Published
/// on a typed broadcast bus instead of string-keyed dispatch.
#[derive(Debug, Clone)]
pub enum InputEvent {
    Prices(PriceSeries),
    IndoorTemp { sensor: usize, value: DegreeCelsius },
    OutdoorTemp(DegreeCelsius),
    WaterTemp(DegreeCelsius),
    DegreeMinutes(DegreeMinutes),
    PeakBreach(bool),
    AddonHeater(bool),
    PresetChanged(Preset),
}

/// Publishing side of the input bus, handed to the ingestion adapters.
#[derive(Clone)]
pub struct InputBus {
    tx: broadcast::Sender<InputEvent>,
}

impl InputBus {
    pub fn new() -> Self {
        Self {
            tx: broadcast::channel(256).0,
        }
    }

    pub fn publish(&self, event: InputEvent) {
        //no subscribers is fine during startup
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InputEvent> {
        self.tx.subscribe()
    }
}

impl Default for InputBus {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory snapshot of all inputs, replaced wholesale per reading. The
/// coordinator owns the only instance; there is no shared mutable state.
pub struct Inputs {
    pub prices: Option<PriceSeries>,
    pub indoor: Vec<Option<DegreeCelsius>>,
    pub indoor_trend: TrendTracker,
    pub outdoor: Option<DegreeCelsius>,
    pub water_temp: Option<DegreeCelsius>,
    pub water_trend: TrendTracker,
    pub degree_minutes_trend: TrendTracker,
    pub peak_breach: bool,
    pub addon_heater: bool,
    pub preset: Preset,
}

impl Inputs {
    /// Fraction of configured sensors that must have reported before offset
    /// computation starts.
    const MIN_REPORTED_FRACTION: f64 = 0.2;

    pub fn new(indoor_sensor_count: usize, preset: Preset) -> Self {
        Self {
            prices: None,
            indoor: vec![None; indoor_sensor_count],
            indoor_trend: TrendTracker::new(20, Duration::hours(2), 2),
            outdoor: None,
            water_temp: None,
            //zero-readings from the water sensor are invalid, not cold water
            water_trend: TrendTracker::new(20, Duration::hours(6), 2).with_ignore_below(5.0),
            degree_minutes_trend: TrendTracker::new(20, Duration::hours(2), 0),
            peak_breach: false,
            addon_heater: false,
            preset,
        }
    }

    pub fn apply(&mut self, event: InputEvent) {
        let now = t!(now);

        match event {
            InputEvent::Prices(series) => self.prices = Some(series),

            InputEvent::IndoorTemp { sensor, value } => {
                match self.indoor.get_mut(sensor) {
                    Some(slot) => *slot = Some(value),
                    None => {
                        tracing::warn!("Reading from unconfigured indoor sensor {}", sensor);
                        return;
                    }
                }

                if let Some(mean) = self.indoor_mean() {
                    self.indoor_trend.add_reading(mean.0, now);
                }
            }

            InputEvent::OutdoorTemp(value) => self.outdoor = Some(value),

            InputEvent::WaterTemp(value) => {
                self.water_temp = Some(value);
                self.water_trend.add_reading(value.0, now);
            }

            InputEvent::DegreeMinutes(value) => {
                self.degree_minutes_trend.add_reading(value.0, now);
            }

            InputEvent::PeakBreach(breached) => self.peak_breach = breached,

            InputEvent::AddonHeater(active) => self.addon_heater = active,

            InputEvent::PresetChanged(preset) => self.preset = preset,
        }
    }

    pub fn reported_temps(&self) -> Vec<DegreeCelsius> {
        self.indoor.iter().flatten().copied().collect()
    }

    pub fn indoor_mean(&self) -> Option<DegreeCelsius> {
        let reported = self.reported_temps();
        if reported.is_empty() {
            return None;
        }

        let mean = reported.iter().map(|t| t.0).sum::<f64>() / reported.len() as f64;
        Some(DegreeCelsius(mean))
    }

    pub fn sensors_ready(&self) -> bool {
        if self.indoor.is_empty() {
            return false;
        }

        let reported = self.indoor.iter().flatten().count() as f64;
        reported / self.indoor.len() as f64 > Self::MIN_REPORTED_FRACTION
    }

    /// Degree-minutes below zero mean the compressor is actively working off
    /// a heating deficit.
    pub fn heating_active(&self) -> bool {
        self.degree_minutes_trend.latest().is_some_and(|dp| dp.value < 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensors_ready_needs_a_fifth_of_the_sensors() {
        let mut inputs = Inputs::new(5, Preset::Normal);
        assert!(!inputs.sensors_ready());

        inputs.apply(InputEvent::IndoorTemp {
            sensor: 2,
            value: DegreeCelsius(20.4),
        });

        //1 of 5 reported: exactly 20%, not enough yet
        assert!(!inputs.sensors_ready());

        inputs.apply(InputEvent::IndoorTemp {
            sensor: 0,
            value: DegreeCelsius(21.0),
        });
        assert!(inputs.sensors_ready());
    }

    #[test]
    fn indoor_mean_covers_only_reported_sensors() {
        let mut inputs = Inputs::new(3, Preset::Normal);
        inputs.apply(InputEvent::IndoorTemp {
            sensor: 0,
            value: DegreeCelsius(20.0),
        });
        inputs.apply(InputEvent::IndoorTemp {
            sensor: 1,
            value: DegreeCelsius(22.0),
        });

        assert_eq!(inputs.indoor_mean(), Some(DegreeCelsius(21.0)));
    }

    #[test]
    fn unknown_sensor_is_ignored() {
        let mut inputs = Inputs::new(1, Preset::Normal);
        inputs.apply(InputEvent::IndoorTemp {
            sensor: 7,
            value: DegreeCelsius(20.0),
        });

        assert_eq!(inputs.indoor_mean(), None);
    }

    #[test]
    fn heating_active_follows_degree_minutes() {
        let mut inputs = Inputs::new(1, Preset::Normal);
        assert!(!inputs.heating_active());

        inputs.apply(InputEvent::DegreeMinutes(DegreeMinutes(-250.0)));
        assert!(inputs.heating_active());

        inputs.apply(InputEvent::DegreeMinutes(DegreeMinutes(10.0)));
        assert!(!inputs.heating_active());
    }
}
