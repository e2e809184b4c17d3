use std::collections::BTreeSet;

use crate::core::time::{DateTime, Duration};
use crate::core::unit::{DegreeCelsius, EuroPerKwh};
use crate::heating::Preset;
use crate::pricing::PriceSeries;
use crate::t;

use super::{BoostPlan, Demand};

const NORMAL_TARGET: f64 = 47.0;
/// Reachable only while the price is at or below the minimum-price threshold.
const CHEAP_CEILING: f64 = 53.0;
/// Predicted water temperature never extrapolates below this.
const PREDICTED_FLOOR: f64 = 10.0;
/// A boost is started slightly before the selected hour so the water is warm
/// when the hour begins.
const PREHEAT_LEAD_MINUTES: i64 = 10;
/// Water this far below the limit is critically low; no bargain-hunting then.
const CRITICAL_DROP: f64 = 20.0;

pub struct BoostQuery<'a> {
    pub prices: &'a PriceSeries,
    pub demand_hours: &'a BTreeSet<u32>,
    pub quiet_hours: &'a BTreeSet<u32>,
    pub current_temp: DegreeCelsius,
    pub trend_per_hour: f64,
    pub min_price: EuroPerKwh,
    pub preset: Preset,
    pub latest_boost: Option<DateTime>,
    pub now: DateTime,
}

/// Forward model of one hour in the search horizon.
#[derive(Debug, Clone)]
struct HourRecord {
    at: DateTime,
    price: f64,
    /// Price relative to the running mean from the search origin.
    spread: f64,
    predicted_temp: f64,
    is_demand: bool,
    is_quiet: bool,
    is_cold: bool,
    target: f64,
}

/// Predicts when the next hot-water boost should start and to which target
/// temperature. `None` when no hour in the known horizon qualifies.
pub fn next_start(query: &BoostQuery) -> Option<BoostPlan> {
    let mut origin = query.now;

    //avoid an immediate re-boost right after the previous cycle
    if let Some(latest) = query.latest_boost
        && query.now - latest < Duration::hours(1)
    {
        origin = origin + Duration::hours(1);
    }

    let records = build_records(query, origin)?;

    let initial_pos = records.iter().position(|r| {
        r.is_cold
            && !r.is_quiet
            && (r.spread < 1.0 || r.price <= query.min_price.0 || r.is_demand || query.current_temp.0 < r.target)
    })?;

    let selected = refine_selection(&records, initial_pos, query);

    let start = (selected.at - Duration::minutes(PREHEAT_LEAD_MINUTES)).max(query.now);
    let gap = DegreeCelsius(selected.target) - query.current_temp;

    Some(BoostPlan {
        at: start,
        target_temp: DegreeCelsius(selected.target),
        duration: Demand::from_temperature_gap(gap).boost_duration(),
    })
}

fn build_records(query: &BoostQuery, origin: DateTime) -> Option<Vec<HourRecord>> {
    let day_start = query.now.at(t!(0:00)).ok()?;
    let horizon = query.prices.horizon();

    let origin_index = (origin - day_start).as_hours().max(0) as usize;
    if origin_index >= horizon.len() {
        return None;
    }

    let limit = query.preset.water_limit().0;
    let min_price = query.min_price.0;

    let mut records = Vec::with_capacity(horizon.len() - origin_index);
    let mut price_sum = 0.0;

    for (offset, price) in horizon[origin_index..].iter().enumerate() {
        let price = f64::from(price);
        price_sum += price;
        let mean = price_sum / (offset + 1) as f64;
        let spread = if mean == 0.0 { 1.0 } else { price / mean };

        let at = day_start + Duration::hours((origin_index + offset) as i64);
        let hours_elapsed = (at - origin).as_hours_f64().max(0.0);
        let predicted_temp = (query.current_temp.0 + query.trend_per_hour * hours_elapsed).max(PREDICTED_FLOOR);

        let hour = at.hour();
        let is_demand = query.demand_hours.contains(&hour);
        let is_quiet = query.quiet_hours.contains(&hour);

        let next_is_cheap = horizon
            .get(origin_index + offset + 1)
            .is_some_and(|next| f64::from(next) <= min_price);

        let cold_limit = if price <= min_price && next_is_cheap {
            limit + 5.0
        } else if is_demand {
            limit + 2.0
        } else {
            limit
        };

        records.push(HourRecord {
            at,
            price,
            spread,
            predicted_temp,
            is_demand,
            is_quiet,
            is_cold: predicted_temp <= cold_limit,
            target: hour_target(price, spread, is_demand, predicted_temp, min_price),
        });
    }

    Some(records)
}

/// 47 °C base, 53 °C reachable at cheap hours. A hot tank keeps the base; a
/// cold one earns a bonus for cheap spreads and demand hours, capped at the
/// hour's ceiling.
fn hour_target(price: f64, spread: f64, is_demand: bool, predicted_temp: f64, min_price: f64) -> f64 {
    let ceiling = if price <= min_price { CHEAP_CEILING } else { NORMAL_TARGET };

    if predicted_temp >= NORMAL_TARGET {
        return NORMAL_TARGET;
    }

    let spread_bonus = if spread < 0.5 {
        20.0
    } else if spread < 0.8 {
        15.0
    } else if spread < 1.0 {
        10.0
    } else {
        0.0
    };

    let demand_bonus = if is_demand { 10.0 } else { 0.0 };

    (NORMAL_TARGET + spread_bonus + demand_bonus).min(ceiling)
}

/// Looks for a better alternative within ±2 hours of the initial pick: the
/// cheapest cold demand hour first, otherwise any cheaper hour as long as the
/// water can afford to wait.
fn refine_selection<'a>(records: &'a [HourRecord], initial_pos: usize, query: &BoostQuery) -> &'a HourRecord {
    let initial = &records[initial_pos];

    let lo = initial_pos.saturating_sub(2);
    let hi = (initial_pos + 2).min(records.len() - 1);

    let window = || {
        records[lo..=hi]
            .iter()
            .enumerate()
            .filter(move |(i, _)| lo + i != initial_pos)
            .map(|(_, r)| r)
    };

    let better_demand = window()
        .filter(|r| r.is_demand && !r.is_quiet && r.is_cold && r.spread < initial.spread)
        .min_by(|a, b| a.spread.total_cmp(&b.spread));

    if let Some(better) = better_demand {
        return better;
    }

    let critically_low = query.current_temp.0 < query.preset.water_limit().0 - CRITICAL_DROP;
    if initial.is_demand || critically_low {
        return initial;
    }

    window()
        .filter(|r| !r.is_quiet && r.spread < initial.spread)
        .min_by(|a, b| a.spread.total_cmp(&b.spread))
        .unwrap_or(initial)
}
