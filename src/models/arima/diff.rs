//! Differencing and integration for ARIMA models.

use crate::utils::stats::variance;

/// Difference `series` `d` times.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Lag-`period` differences `x[t] - x[t - period]`, applied `d` times.
///
/// Returns an empty vector once the series is no longer than the lag.
pub fn seasonal_difference(series: &[f64], d: usize, period: usize) -> Vec<f64> {
    if period == 0 {
        return series.to_vec();
    }
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= period {
            return Vec::new();
        }
        result = result[period..]
            .iter()
            .zip(&result)
            .map(|(curr, prev)| curr - prev)
            .collect();
    }
    result
}

/// Undo `d` rounds of differencing on values that continue `original`.
pub fn integrate(differenced: &[f64], original: &[f64], d: usize) -> Vec<f64> {
    let mut result = differenced.to_vec();
    for level in (0..d).rev() {
        // Last observed value at this differencing level anchors the sum
        let anchor = difference(original, level).last().copied().unwrap_or(0.0);
        result = result
            .iter()
            .scan(anchor, |acc, &step| {
                *acc += step;
                Some(*acc)
            })
            .collect();
    }
    result
}

/// Suggest a differencing order, at most `max_d`, by variance ratio.
///
/// Each extra difference is taken only while it cuts the variance to below
/// 90% of the previous level.
pub fn suggest_differencing(series: &[f64], max_d: usize) -> usize {
    let mut current = series.to_vec();
    let mut current_var = variance(&current);
    let mut d = 0;

    while d < max_d {
        let next = difference(&current, 1);
        let next_var = variance(&next);
        if !(current_var > 0.0) || !(next_var / current_var < 0.9) {
            break;
        }
        current = next;
        current_var = next_var;
        d += 1;
    }
    d
}
