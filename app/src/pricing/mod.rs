mod extrema;
mod offset;

pub use extrema::{identify_peaks, identify_valleys};
pub use offset::compute_offsets;

use std::collections::BTreeMap;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::core::unit::EuroPerKwh;

/// Hourly spot prices for today and, after the daily publication time,
/// tomorrow. Replaced wholesale on every ingestion update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    today: Vec<EuroPerKwh>,
    tomorrow: Vec<EuroPerKwh>,
}

impl PriceSeries {
    /// Today must carry a full DST-aware day (23-25 entries). Tomorrow with
    /// fewer than 24 entries is treated as absent.
    pub fn new(today: Vec<EuroPerKwh>, tomorrow: Vec<EuroPerKwh>) -> anyhow::Result<Self> {
        if !(23..=25).contains(&today.len()) {
            bail!("Expected 23-25 prices for today, got {}", today.len());
        }

        let tomorrow = if tomorrow.len() >= 24 { tomorrow } else { vec![] };

        Ok(Self { today, tomorrow })
    }

    pub fn today(&self) -> &[EuroPerKwh] {
        &self.today
    }

    pub fn tomorrow(&self) -> Option<&[EuroPerKwh]> {
        if self.tomorrow.is_empty() {
            None
        } else {
            Some(&self.tomorrow)
        }
    }

    /// All known prices, today first.
    pub fn horizon(&self) -> Vec<EuroPerKwh> {
        let mut all = self.today.clone();
        all.extend_from_slice(&self.tomorrow);
        all
    }

    pub fn price_at_hour(&self, hour: usize) -> Option<EuroPerKwh> {
        self.today.get(hour).copied()
    }
}

/// Per-hour heating-curve offsets, held separately for today and tomorrow.
/// |offset| stays within the effective tolerance cap after smoothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetSchedule {
    pub today: BTreeMap<u32, i32>,
    pub tomorrow: BTreeMap<u32, i32>,
}

impl OffsetSchedule {
    pub fn offset_at(&self, hour: u32) -> Option<i32> {
        self.today.get(&hour).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prices(values: &[f64]) -> Vec<EuroPerKwh> {
        values.iter().map(|v| EuroPerKwh(*v)).collect()
    }

    #[test]
    fn rejects_short_today() {
        let result = PriceSeries::new(prices(&[0.1; 12]), vec![]);
        assert!(result.is_err());
    }

    #[test]
    fn partial_tomorrow_is_treated_as_absent() {
        let series = PriceSeries::new(prices(&[0.1; 24]), prices(&[0.2; 12])).unwrap();
        assert_eq!(series.tomorrow(), None);
        assert_eq!(series.horizon().len(), 24);
    }

    #[test]
    fn dst_short_day_is_accepted() {
        let series = PriceSeries::new(prices(&[0.1; 23]), prices(&[0.2; 24])).unwrap();
        assert_eq!(series.today().len(), 23);
        assert_eq!(series.horizon().len(), 47);
    }
}
