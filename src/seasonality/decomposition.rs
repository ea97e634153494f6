//! Additive trend/seasonal/residual decomposition of a weekly series.

use super::stl::{center, centered_moving_average, Stl};
use crate::core::WeeklySeries;
use crate::error::{Result, SeasonalityError};
use crate::utils::stats::{finite_span, is_negligible, mean, variance};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Trend smoother used by [`decompose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrendMethod {
    /// Local-linear LOESS (periodic-window STL); trend defined everywhere.
    #[default]
    Loess,
    /// Classical centered moving average; trend undefined at both edges.
    MovingAverage,
}

/// Shortest seasonal period [`decompose`] accepts; smaller values are raised to it.
pub const MIN_PERIOD: usize = 2;

/// Options for [`decompose`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecompositionConfig {
    pub period: usize,
    pub method: TrendMethod,
    pub robust: bool,
    pub inner_iterations: usize,
    pub outer_iterations: usize,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            period: 52,
            method: TrendMethod::Loess,
            robust: true,
            inner_iterations: 5,
            outer_iterations: 6,
        }
    }
}

impl DecompositionConfig {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: TrendMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }
}

/// Four aligned components of a weekly series.
///
/// `original[i] == trend[i] + seasonal[i] + residual[i]` wherever `trend[i]`
/// is defined. With [`TrendMethod::MovingAverage`] the first and last
/// `period / 2` entries of `trend` and `residual` are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecompositionResult {
    pub dates: Vec<NaiveDate>,
    pub original: Vec<f64>,
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    /// Canonical zero-mean cycle; `seasonal[i] == cycle[i % period]`.
    pub cycle: Vec<f64>,
    pub period: usize,
    pub method: TrendMethod,
    /// Reason the constant-trend fallback was used, if it was.
    pub fallback: Option<SeasonalityError>,
}

impl DecompositionResult {
    pub fn len(&self) -> usize {
        self.original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Whether the constant-trend fallback replaced the smoother.
    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Whether the series had no variation at all.
    pub fn is_degenerate(&self) -> bool {
        matches!(self.fallback, Some(SeasonalityError::DegenerateSeries(_)))
    }

    /// Half-open range of indices where the trend is defined.
    pub fn defined_span(&self) -> (usize, usize) {
        finite_span(&self.trend)
    }

    /// `original - trend`, i.e. `seasonal + residual`.
    pub fn detrended(&self) -> Vec<f64> {
        self.original
            .iter()
            .zip(self.trend.iter())
            .map(|(y, t)| y - t)
            .collect()
    }

    /// Seasonal value at position `index`, which may lie past the series end.
    pub fn seasonal_at(&self, index: usize) -> f64 {
        self.cycle[index % self.period]
    }

    /// `var(seasonal) / (var(seasonal) + var(residual))` over the defined span.
    ///
    /// `None` when both variances vanish, as for a constant series.
    pub fn seasonal_strength(&self) -> Option<f64> {
        let (start, end) = self.defined_span();
        if end - start < 2 {
            return None;
        }
        let var_s = variance(&self.seasonal[start..end]);
        let var_r = variance(&self.residual[start..end]);
        let total = var_s + var_r;
        if is_negligible(total, self.scale_sq()) {
            return None;
        }
        Some((var_s / total).clamp(0.0, 1.0))
    }

    /// `1 - var(residual) / var(trend + residual)` over the defined span.
    pub fn trend_strength(&self) -> Option<f64> {
        let (start, end) = self.defined_span();
        if end - start < 2 {
            return None;
        }
        let trend_plus_residual: Vec<f64> = (start..end)
            .map(|i| self.trend[i] + self.residual[i])
            .collect();
        let var_tr = variance(&trend_plus_residual);
        if is_negligible(var_tr, self.scale_sq()) {
            return None;
        }
        let var_r = variance(&self.residual[start..end]);
        Some((1.0 - var_r / var_tr).clamp(0.0, 1.0))
    }

    /// Largest relative reconstruction error over the defined span.
    pub fn max_reconstruction_error(&self) -> f64 {
        let (start, end) = self.defined_span();
        (start..end)
            .map(|i| {
                let rebuilt = self.trend[i] + self.seasonal[i] + self.residual[i];
                (rebuilt - self.original[i]).abs() / self.original[i].abs().max(1.0)
            })
            .fold(0.0, f64::max)
    }

    fn scale_sq(&self) -> f64 {
        let m = mean(&self.original);
        m * m
    }
}

/// Decompose a weekly series into trend, seasonal and residual parts.
///
/// Never fails: when the smoother cannot run (fewer than two full periods,
/// zero variance, non-finite output) the result is a constant trend at the
/// series mean with zero seasonality, and `fallback` records why. A period
/// below [`MIN_PERIOD`] is raised to it.
pub fn decompose(series: &WeeklySeries, config: &DecompositionConfig) -> DecompositionResult {
    let config = &DecompositionConfig {
        period: config.period.max(MIN_PERIOD),
        ..*config
    };
    let values = series.values();
    let period = config.period;

    let outcome = if is_negligible(variance(values), mean(values).powi(2)) {
        Err(SeasonalityError::DegenerateSeries(
            "series has zero variance".into(),
        ))
    } else {
        match config.method {
            TrendMethod::Loess => loess_components(values, config),
            TrendMethod::MovingAverage => moving_average_components(values, period),
        }
    };

    match outcome {
        Ok((trend, seasonal, residual, cycle)) => {
            tracing::debug!(
                weeks = values.len(),
                period,
                method = ?config.method,
                "decomposed weekly series"
            );
            DecompositionResult {
                dates: series.dates().to_vec(),
                original: values.to_vec(),
                trend,
                seasonal,
                residual,
                cycle,
                period,
                method: config.method,
                fallback: None,
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "decomposition fell back to constant trend");
            constant_decomposition(series, config, err)
        }
    }
}

type Components = (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>);

fn loess_components(values: &[f64], config: &DecompositionConfig) -> Result<Components> {
    let mut stl = Stl::new(config.period).with_inner_iterations(config.inner_iterations);
    if config.robust {
        stl = stl.with_outer_iterations(config.outer_iterations);
    }
    let parts = stl.decompose(values).map_err(as_fit_failure)?;

    // Recompute so the reconstruction holds to rounding
    let residual = (0..values.len())
        .map(|i| values[i] - parts.trend[i] - parts.seasonal[i])
        .collect();
    Ok((parts.trend, parts.seasonal, residual, parts.cycle))
}

fn moving_average_components(values: &[f64], period: usize) -> Result<Components> {
    let n = values.len();
    if period < 2 || n < 2 * period {
        return Err(as_fit_failure(SeasonalityError::InsufficientData {
            needed: 2 * period.max(2),
            got: n,
        }));
    }

    let trend = centered_moving_average(values, period);
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, (&y, &t)) in values.iter().zip(trend.iter()).enumerate() {
        if t.is_finite() {
            sums[i % period] += y - t;
            counts[i % period] += 1;
        }
    }
    let mut cycle: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();
    center(&mut cycle);

    let seasonal: Vec<f64> = (0..n).map(|i| cycle[i % period]).collect();
    let residual: Vec<f64> = (0..n).map(|i| values[i] - trend[i] - seasonal[i]).collect();
    Ok((trend, seasonal, residual, cycle))
}

fn as_fit_failure(err: SeasonalityError) -> SeasonalityError {
    match err {
        SeasonalityError::InsufficientData { needed, got } => SeasonalityError::ModelFit(format!(
            "seasonal smoothing needs {} weeks (two full periods), got {}",
            needed, got
        )),
        SeasonalityError::ModelFit(msg) => SeasonalityError::ModelFit(msg),
        other => SeasonalityError::ModelFit(other.to_string()),
    }
}

fn constant_decomposition(
    series: &WeeklySeries,
    config: &DecompositionConfig,
    reason: SeasonalityError,
) -> DecompositionResult {
    let values = series.values();
    let level = mean(values);
    let n = values.len();
    DecompositionResult {
        dates: series.dates().to_vec(),
        original: values.to_vec(),
        trend: vec![level; n],
        seasonal: vec![0.0; n],
        residual: values.iter().map(|y| y - level).collect(),
        cycle: vec![0.0; config.period],
        period: config.period,
        method: config.method,
        fallback: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn series(values: Vec<f64>) -> WeeklySeries {
        WeeklySeries::from_values(NaiveDate::from_ymd_opt(2021, 1, 4).unwrap(), values).unwrap()
    }

    fn trending_sine(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| 40_000.0 + 178.0 * t as f64 + 8_000.0 * (2.0 * PI * t as f64 / 52.0).sin())
            .collect()
    }

    #[test]
    fn loess_decomposition_reconstructs() {
        let result = decompose(&series(trending_sine(110)), &DecompositionConfig::default());
        assert!(!result.used_fallback());
        assert_eq!(result.len(), 110);
        assert!(result.max_reconstruction_error() < 1e-9);
        assert!(result.cycle.iter().sum::<f64>().abs() < 1e-6);
        assert!(result.seasonal_strength().unwrap() > 0.9);
    }

    #[test]
    fn moving_average_has_undefined_edges() {
        let config = DecompositionConfig::default().with_method(TrendMethod::MovingAverage);
        let result = decompose(&series(trending_sine(156)), &config);
        assert!(!result.used_fallback());
        assert_eq!(result.defined_span(), (26, 130));
        assert!(result.trend[0].is_nan() && result.residual[155].is_nan());
        assert!(result.seasonal.iter().all(|s| s.is_finite()));
        assert!(result.max_reconstruction_error() < 1e-9);
        // Linear trend passes through the symmetric filter unchanged
        assert_relative_eq!(result.trend[60], 40_000.0 + 178.0 * 60.0, epsilon = 1e-6);
    }

    #[test]
    fn short_series_falls_back() {
        let result = decompose(&series(trending_sine(60)), &DecompositionConfig::default());
        assert!(matches!(result.fallback, Some(SeasonalityError::ModelFit(_))));
        assert!(!result.is_degenerate());
        let level = mean(&result.original);
        assert!(result.trend.iter().all(|&t| t == level));
        assert!(result.seasonal.iter().all(|&s| s == 0.0));
        assert!(result.max_reconstruction_error() < 1e-12);
    }

    #[test]
    fn constant_series_is_degenerate() {
        let result = decompose(&series(vec![50_000.0; 60]), &DecompositionConfig::default());
        assert!(result.is_degenerate());
        assert!(result.residual.iter().all(|&r| r == 0.0));
        assert_eq!(result.seasonal_strength(), None);
    }

    #[test]
    fn seasonal_at_wraps_the_cycle() {
        let result = decompose(&series(trending_sine(110)), &DecompositionConfig::default());
        assert_eq!(result.seasonal_at(110), result.cycle[110 % 52]);
        assert_eq!(result.seasonal_at(3), result.seasonal[3]);
    }

    #[test]
    fn zero_period_is_raised_to_minimum() {
        assert_eq!(DecompositionConfig::new(0).period, MIN_PERIOD);

        let config = DecompositionConfig {
            period: 0,
            ..DecompositionConfig::default()
        };
        let result = decompose(&series(trending_sine(60)), &config);
        assert_eq!(result.period, MIN_PERIOD);
        assert_eq!(result.cycle.len(), MIN_PERIOD);
        assert!(result.seasonal_at(7).is_finite());
    }
}
