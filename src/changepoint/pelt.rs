//! PELT (Pruned Exact Linear Time) algorithm for changepoint detection.
//!
//! An exact method for detecting multiple changepoints with O(n) average complexity.

use super::cost::{total_cost, CostFunction, PrefixCosts};
use crate::error::{Result, SeasonalityError};
use crate::utils::stats::variance;

/// Segment variances are floored at this fraction of the series variance.
pub const RELATIVE_VARIANCE_FLOOR: f64 = 1e-6;

/// Configuration for PELT algorithm.
#[derive(Debug, Clone)]
pub struct PeltConfig {
    pub cost_fn: CostFunction,
    /// Penalty per changepoint; `None` uses `3 * ln(n)`.
    pub penalty: Option<f64>,
    pub min_segment_length: usize,
}

impl Default for PeltConfig {
    fn default() -> Self {
        Self {
            cost_fn: CostFunction::MeanVariance,
            penalty: None,
            min_segment_length: 8,
        }
    }
}

impl PeltConfig {
    /// Set the cost function.
    pub fn cost_function(mut self, cost_fn: CostFunction) -> Self {
        self.cost_fn = cost_fn;
        self
    }

    /// Set the penalty.
    pub fn penalty(mut self, penalty: f64) -> Self {
        self.penalty = Some(penalty);
        self
    }

    /// Set minimum segment length.
    pub fn min_segment_length(mut self, min_len: usize) -> Self {
        self.min_segment_length = min_len.max(1);
        self
    }

    /// Penalty used for a series of length `n`.
    pub fn penalty_for(&self, n: usize) -> f64 {
        self.penalty
            .unwrap_or_else(|| 3.0 * (n.max(2) as f64).ln())
    }
}

/// Result of PELT changepoint detection.
#[derive(Debug, Clone, PartialEq)]
pub struct PeltResult {
    /// First index of each new segment.
    pub changepoints: Vec<usize>,
    /// Half-open segment bounds.
    pub segments: Vec<(usize, usize)>,
    /// Total cost, excluding penalties.
    pub cost: f64,
    pub penalty: f64,
}

impl PeltResult {
    pub fn n_changepoints(&self) -> usize {
        self.changepoints.len()
    }

    /// Get the segment containing a specific index.
    pub fn segment_for_index(&self, index: usize) -> Option<(usize, usize)> {
        self.segments
            .iter()
            .find(|&&(start, end)| index >= start && index < end)
            .copied()
    }

    /// Get segment means.
    pub fn segment_means(&self, series: &[f64]) -> Vec<f64> {
        self.segments
            .iter()
            .map(|&(start, end)| {
                let segment = &series[start..end];
                segment.iter().sum::<f64>() / segment.len().max(1) as f64
            })
            .collect()
    }
}

/// Detect changepoints using the PELT algorithm.
///
/// # Errors
/// `InvalidInput` for non-finite values, `DegenerateSeries` when the series
/// has no variance, `Computation` when the recursion produces no finite cost.
///
/// # Example
/// ```
/// use revenue_seasonality::changepoint::{pelt_detect, CostFunction, PeltConfig};
///
/// let mut series = vec![0.0, 1.0, 0.0, -1.0].repeat(10);
/// series.extend(vec![20.0, 21.0, 20.0, 19.0].repeat(10));
///
/// let config = PeltConfig::default().cost_function(CostFunction::L2).penalty(10.0);
/// let result = pelt_detect(&series, &config).unwrap();
/// assert_eq!(result.changepoints, vec![40]);
/// ```
pub fn pelt_detect(series: &[f64], config: &PeltConfig) -> Result<PeltResult> {
    let n = series.len();
    if series.iter().any(|v| !v.is_finite()) {
        return Err(SeasonalityError::InvalidInput(
            "changepoint search needs finite values".into(),
        ));
    }

    let overall = variance(series);
    if !(overall > 0.0) || !overall.is_finite() {
        return Err(SeasonalityError::DegenerateSeries(
            "changepoint search needs a series with variance".into(),
        ));
    }

    let penalty = config.penalty_for(n);
    let min_len = config.min_segment_length.max(1);
    let floor = RELATIVE_VARIANCE_FLOOR * overall;

    if n < 2 * min_len {
        return Ok(PeltResult {
            changepoints: Vec::new(),
            segments: vec![(0, n)],
            cost: total_cost(series, &[], config.cost_fn, floor),
            penalty,
        });
    }

    // Centering keeps the prefix sums well conditioned
    let level = series.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = series.iter().map(|x| x - level).collect();
    let costs = PrefixCosts::new(&centered, config.cost_fn, floor);

    // f[t] = minimum penalised cost of series[0..t]
    let mut f = vec![f64::INFINITY; n + 1];
    f[0] = -penalty;
    let mut last_change: Vec<usize> = vec![0; n + 1];
    let mut candidates: Vec<usize> = vec![0];

    for t in min_len..=n {
        let mut best_cost = f64::INFINITY;
        let mut best_cp = 0;

        for &s in &candidates {
            if t - s >= min_len {
                let total = f[s] + costs.cost(s, t) + penalty;
                if total < best_cost {
                    best_cost = total;
                    best_cp = s;
                }
            }
        }

        f[t] = best_cost;
        last_change[t] = best_cp;

        // Pruning: drop candidates that can never be optimal again
        candidates.retain(|&s| t - s < min_len || f[s] + costs.cost(s, t) <= f[t]);
        if t + min_len <= n {
            candidates.push(t);
        }
    }

    if !f[n].is_finite() {
        return Err(SeasonalityError::Computation(
            "changepoint recursion produced no finite cost".into(),
        ));
    }

    let mut changepoints = Vec::new();
    let mut t = n;
    while t > 0 {
        let prev = last_change[t];
        if prev > 0 {
            changepoints.push(prev);
        }
        t = prev;
    }
    changepoints.reverse();

    let mut segments = Vec::with_capacity(changepoints.len() + 1);
    let mut start = 0;
    for &cp in &changepoints {
        segments.push((start, cp));
        start = cp;
    }
    segments.push((start, n));

    Ok(PeltResult {
        cost: total_cost(series, &changepoints, config.cost_fn, floor),
        changepoints,
        segments,
        penalty,
    })
}
