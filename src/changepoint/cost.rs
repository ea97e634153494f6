//! Segment cost functions for changepoint detection.

use serde::{Deserialize, Serialize};

/// Cost function used to score a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CostFunction {
    /// Sum of squared deviations from the segment mean; detects mean shifts.
    L2,
    /// Normal negative log-likelihood with segment mean and variance;
    /// detects joint mean and variance changes.
    #[default]
    MeanVariance,
}

/// L2 cost: `sum((x - mean)^2)`.
pub fn l2_cost(segment: &[f64]) -> f64 {
    if segment.is_empty() {
        return 0.0;
    }
    let mean = segment.iter().sum::<f64>() / segment.len() as f64;
    segment.iter().map(|x| (x - mean).powi(2)).sum()
}

/// Mean-variance cost: `n * (1 + ln(max(variance, floor)))`.
///
/// `variance` is the maximum-likelihood estimate `sum((x - mean)^2) / n`.
pub fn mean_variance_cost(segment: &[f64], variance_floor: f64) -> f64 {
    let n = segment.len();
    if n == 0 {
        return 0.0;
    }
    let variance = l2_cost(segment) / n as f64;
    n as f64 * (1.0 + variance.max(variance_floor).ln())
}

/// Cost of a single segment.
pub fn segment_cost(segment: &[f64], cost_fn: CostFunction, variance_floor: f64) -> f64 {
    match cost_fn {
        CostFunction::L2 => l2_cost(segment),
        CostFunction::MeanVariance => mean_variance_cost(segment, variance_floor),
    }
}

/// Total cost of a segmentation given its changepoints.
pub fn total_cost(
    series: &[f64],
    changepoints: &[usize],
    cost_fn: CostFunction,
    variance_floor: f64,
) -> f64 {
    let mut bounds = Vec::with_capacity(changepoints.len() + 2);
    bounds.push(0);
    bounds.extend(changepoints.iter().copied().filter(|&c| c > 0 && c < series.len()));
    bounds.push(series.len());
    bounds
        .windows(2)
        .map(|w| segment_cost(&series[w[0]..w[1]], cost_fn, variance_floor))
        .sum()
}

/// Prefix sums for O(1) segment costs.
#[derive(Debug, Clone)]
pub(crate) struct PrefixCosts {
    cum_sum: Vec<f64>,
    cum_sum_sq: Vec<f64>,
    cost_fn: CostFunction,
    variance_floor: f64,
}

impl PrefixCosts {
    pub(crate) fn new(series: &[f64], cost_fn: CostFunction, variance_floor: f64) -> Self {
        let mut cum_sum = Vec::with_capacity(series.len() + 1);
        let mut cum_sum_sq = Vec::with_capacity(series.len() + 1);
        let (mut s, mut sq) = (0.0, 0.0);
        cum_sum.push(0.0);
        cum_sum_sq.push(0.0);
        for &x in series {
            s += x;
            sq += x * x;
            cum_sum.push(s);
            cum_sum_sq.push(sq);
        }
        Self {
            cum_sum,
            cum_sum_sq,
            cost_fn,
            variance_floor,
        }
    }

    /// Cost of `series[start..end]`.
    pub(crate) fn cost(&self, start: usize, end: usize) -> f64 {
        let n = end - start;
        if n == 0 {
            return 0.0;
        }
        let sum = self.cum_sum[end] - self.cum_sum[start];
        let sum_sq = self.cum_sum_sq[end] - self.cum_sum_sq[start];
        let l2 = (sum_sq - sum * sum / n as f64).max(0.0);

        match self.cost_fn {
            CostFunction::L2 => l2,
            CostFunction::MeanVariance => {
                let variance = (l2 / n as f64).max(self.variance_floor);
                n as f64 * (1.0 + variance.ln())
            }
        }
    }
}
