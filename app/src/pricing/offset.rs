use std::collections::BTreeMap;

use crate::core::unit::EuroPerKwh;

use super::{OffsetSchedule, PriceSeries};

/// Hours before this one are scored against the morning deviation population,
/// this one and later against the afternoon population (overlapping at the
/// split hour). Keeps one extreme hour from dominating a full-day window.
const POPULATION_SPLIT_HOUR: usize = 13;

/// Hard ceiling on offset magnitude, independent of the configured tolerance.
const OFFSET_CAP: u32 = 4;

/// Converts the known price horizon into a capped, smoothed per-hour offset
/// schedule. `None` when today's series is too short to recompute on; the
/// caller keeps the prior schedule in that case.
pub fn compute_offsets(prices: &PriceSeries, min_price: EuroPerKwh, tolerance: u32) -> Option<OffsetSchedule> {
    let today_len = prices.today().len();
    if today_len < 23 {
        return None;
    }

    let horizon: Vec<f64> = prices.horizon().iter().map(f64::from).collect();

    let mut deviations = price_deviations(&horizon, min_price.0);
    correct_single_hour_anomalies(&mut deviations);

    let mut schedule: Vec<i32> = deviations.iter().map(|v| v.round() as i32).collect();
    smooth_upward_transitions(&mut schedule, tolerance as i32);

    let cap = tolerance.min(OFFSET_CAP) as i32;
    for value in schedule.iter_mut() {
        *value = (*value).clamp(-cap, cap);
    }

    let today = hour_map(&schedule[..today_len]);
    let tomorrow = match prices.tomorrow() {
        Some(_) => hour_map(&schedule[today_len..]),
        None => BTreeMap::new(),
    };

    Some(OffsetSchedule { today, tomorrow })
}

/// Normalized deviation per hour against its population, with the low-price
/// guardrails applied and rounded to 2 decimals.
fn price_deviations(horizon: &[f64], min_price: f64) -> Vec<f64> {
    let split = POPULATION_SPLIT_HOUR.min(horizon.len() - 1);
    let morning = stats(&horizon[..=split]);
    let afternoon = stats(&horizon[split..]);

    horizon
        .iter()
        .enumerate()
        .map(|(hour, price)| {
            let (mean, std_dev) = if hour < POPULATION_SPLIT_HOUR { morning } else { afternoon };

            let mut deviation = if std_dev == 0.0 { 0.0 } else { (price - mean) / std_dev };

            //low-volatility days should not produce large offsets
            if std_dev < 1.0 {
                deviation *= 0.5;
            }

            //never heat less just because of low spread below the minimum price
            if *price <= min_price {
                deviation = deviation.min(0.0);
            } else if *price <= 2.0 * min_price && deviation > 0.0 {
                deviation -= 1.0;
            }

            (deviation * 100.0).round() / 100.0
        })
        .collect()
}

fn stats(population: &[f64]) -> (f64, f64) {
    if population.is_empty() {
        return (0.0, 0.0);
    }

    let mean = population.iter().sum::<f64>() / population.len() as f64;
    let variance = population.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / population.len() as f64;

    (mean, variance.sqrt())
}

/// An hour whose two neighbors equal each other but differ from it is moved
/// halfway towards the neighbor value. Removes single-hour spikes produced by
/// raw deviation alone.
fn correct_single_hour_anomalies(deviations: &mut [f64]) {
    for i in 1..deviations.len().saturating_sub(1) {
        let (prev, current, next) = (deviations[i - 1], deviations[i], deviations[i + 1]);

        if prev == next && current != prev {
            deviations[i] = current + (prev - current) / 2.0;
        }
    }
}

/// Walking forward, an hour followed by a jump of at least `tolerance` is
/// raised by 1. Prevents the auxiliary electric heater from kicking in on an
/// abrupt offset step.
fn smooth_upward_transitions(schedule: &mut [i32], tolerance: i32) {
    for i in 0..schedule.len().saturating_sub(1) {
        if schedule[i + 1] >= schedule[i] + tolerance {
            schedule[i] += 1;
        }
    }
}

fn hour_map(values: &[i32]) -> BTreeMap<u32, i32> {
    values.iter().enumerate().map(|(hour, v)| (hour as u32, *v)).collect()
}
