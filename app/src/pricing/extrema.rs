use crate::core::unit::EuroPerKwh;

/// A neighbor has to be more than 10% away for an hour to count as a local
/// extremum.
const EXTREMUM_RATIO: f64 = 0.9;

/// Series where max and min are within 15% of each other carry no meaningful
/// extrema at all.
const FLATNESS_RATIO: f64 = 1.15;

/// Hours whose price is a confirmed local maximum: above the series mean and
/// more than 10% above both neighbors. Boundary hours qualify only when they
/// equal the series maximum.
pub fn identify_peaks(prices: &[EuroPerKwh]) -> Vec<usize> {
    let prices: Vec<f64> = prices.iter().map(f64::from).collect();

    extrema(&prices, |price, neighbor, mean, max, _min, is_boundary| {
        if is_boundary {
            price == max
        } else {
            price > mean && neighbor / price < EXTREMUM_RATIO
        }
    })
}

/// Mirror of [`identify_peaks`]: below the mean and more than 10% below both
/// neighbors; boundary hours only when equal to the series minimum.
pub fn identify_valleys(prices: &[EuroPerKwh]) -> Vec<usize> {
    let prices: Vec<f64> = prices.iter().map(f64::from).collect();

    extrema(&prices, |price, neighbor, mean, _max, min, is_boundary| {
        if is_boundary {
            price == min
        } else {
            price < mean && price / neighbor < EXTREMUM_RATIO
        }
    })
}

fn extrema<F>(prices: &[f64], qualifies: F) -> Vec<usize>
where
    F: Fn(f64, f64, f64, f64, f64, bool) -> bool,
{
    if prices.len() < 2 {
        return vec![];
    }

    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    let max = prices.iter().cloned().fold(f64::MIN, f64::max);
    let min = prices.iter().cloned().fold(f64::MAX, f64::min);

    if min > 0.0 && max / min <= FLATNESS_RATIO {
        return vec![];
    }

    let last = prices.len() - 1;

    prices
        .iter()
        .enumerate()
        .filter(|(i, price)| {
            if *i == 0 || *i == last {
                return qualifies(**price, **price, mean, max, min, true);
            }

            qualifies(**price, prices[i - 1], mean, max, min, false)
                && qualifies(**price, prices[i + 1], mean, max, min, false)
        })
        .map(|(i, _)| i)
        .collect()
}
