use std::collections::VecDeque;

use crate::core::time::{DateTime, Duration};
use crate::t;

#[derive(Debug, Clone, PartialEq)]
pub struct DataPoint<V> {
    pub value: V,
    pub timestamp: DateTime,
}

impl<V> DataPoint<V> {
    pub fn new(value: V, timestamp: DateTime) -> Self {
        Self { value, timestamp }
    }
}

impl<V: std::fmt::Display> std::fmt::Display for DataPoint<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.value, self.timestamp.to_human_readable())
    }
}

/// Bounded time-windowed linear-trend estimator over scalar sensor readings.
///
/// Keeps at most `max_samples` readings within `max_age` and reports the slope
/// between the earliest and latest retained sample, in value-units per hour.
#[derive(Debug, Clone)]
pub struct TrendTracker {
    samples: VecDeque<DataPoint<f64>>,
    max_samples: usize,
    max_age: Duration,
    precision: i32,
    ignore_below: Option<f64>,
    created_at: DateTime,
}

impl TrendTracker {
    pub fn new(max_samples: usize, max_age: Duration, precision: i32) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
            max_age,
            precision,
            ignore_below: None,
            created_at: t!(now),
        }
    }

    /// Readings below the floor are discarded on entry. Used to ignore
    /// invalid sensor zero-readings.
    pub fn with_ignore_below(mut self, floor: f64) -> Self {
        self.ignore_below = Some(floor);
        self
    }

    pub fn add_reading(&mut self, value: f64, timestamp: DateTime) {
        if let Some(floor) = self.ignore_below
            && value < floor
        {
            return;
        }

        self.samples.push_back(DataPoint::new(value, timestamp));

        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }

        //age pruning keyed on the latest sample, not the wall clock, so replays are deterministic
        let cutoff = timestamp - self.max_age;
        while self.samples.len() > 2 {
            match self.samples.front() {
                Some(dp) if dp.timestamp < cutoff => {
                    self.samples.pop_front();
                }
                _ => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&DataPoint<f64>> {
        self.samples.back()
    }

    /// Slope between earliest and latest sample in units per hour, rounded to
    /// the configured precision. 0 with fewer than 2 samples or a zero time
    /// span.
    pub fn gradient(&self) -> f64 {
        let (earliest, latest) = match (self.samples.front(), self.samples.back()) {
            (Some(e), Some(l)) if self.samples.len() > 1 => (e, l),
            _ => return 0.0,
        };

        let hours = (latest.timestamp - earliest.timestamp).as_hours_f64();
        if hours == 0.0 {
            return 0.0;
        }

        round_to((latest.value - earliest.value) / hours, self.precision)
    }

    /// True only once the tracker has existed for 5 minutes and holds more
    /// than one sample. Gates trend-based corrections until enough history
    /// exists.
    pub fn is_clean(&self) -> bool {
        self.created_at.elapsed() >= t!(5 minutes) && self.samples.len() > 1
    }

    /// Linear extrapolation from the latest sample along the current gradient
    /// to the instant the tracked quantity crosses `target`. `None` when the
    /// trend does not point towards the target.
    pub fn predicted_time_at_value(&self, target: f64) -> Option<DateTime> {
        let latest = self.latest()?;
        let gradient = self.gradient();

        let remaining = target - latest.value;
        if gradient == 0.0 || (gradient > 0.0) != (remaining > 0.0) {
            return None;
        }

        let hours = remaining / gradient;
        Some(latest.timestamp + Duration::minutes((hours * 60.0).round() as i64))
    }
}

fn round_to(value: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    (value * factor).round() / factor
}
