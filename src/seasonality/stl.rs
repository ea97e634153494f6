//! Seasonal-trend decomposition with LOESS and a periodic seasonal window.
//!
//! The seasonal component is one fixed cycle per period (the "periodic" STL
//! variant): every position in the cycle gets the mean (or, when robust, the
//! median) of its detrended subseries. The trend is a local-linear LOESS of
//! the deseasonalized series. Robust fitting alternates the inner loop with
//! bisquare weights computed from the remainder.

use crate::error::{Result, SeasonalityError};
use crate::utils::fit_line_indexed;
use crate::utils::stats::{mean, median};

/// Components produced by [`Stl::decompose`].
#[derive(Debug, Clone)]
pub struct StlComponents {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
    /// Zero-mean seasonal cycle of length `period`; `seasonal[i] == cycle[i % period]`.
    pub cycle: Vec<f64>,
    /// Final robustness weights (all 1 when not robust).
    pub weights: Vec<f64>,
}

/// STL decomposition configuration and algorithm.
#[derive(Debug, Clone)]
pub struct Stl {
    period: usize,
    /// Trend LOESS span (nt), always odd.
    trend_span: usize,
    inner_iterations: usize,
    outer_iterations: usize,
    robust: bool,
}

impl Stl {
    /// Create a decomposer for the given period.
    ///
    /// The trend span follows Cleveland et al. (1990) with `ns = period + 1`.
    pub fn new(period: usize) -> Self {
        let ns = (period | 1) as f64;
        let nt = (1.5 * period as f64 / (1.0 - 1.5 / ns)).ceil() as usize;
        Self {
            period,
            trend_span: nt | 1,
            inner_iterations: 2,
            outer_iterations: 0,
            robust: false,
        }
    }

    /// Enable robust fitting with the default six outer iterations.
    pub fn robust(mut self) -> Self {
        self.robust = true;
        self.outer_iterations = 6;
        self
    }

    pub fn with_inner_iterations(mut self, n: usize) -> Self {
        self.inner_iterations = n.max(1);
        self
    }

    /// Set number of outer (robustness) iterations.
    pub fn with_outer_iterations(mut self, n: usize) -> Self {
        self.outer_iterations = n;
        if n > 0 {
            self.robust = true;
        }
        self
    }

    pub fn with_trend_span(mut self, span: usize) -> Self {
        self.trend_span = span.max(3) | 1;
        self
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn trend_span(&self) -> usize {
        self.trend_span
    }

    /// Decompose `series` into trend, seasonal and remainder.
    ///
    /// # Errors
    /// `InsufficientData` when the series holds fewer than two full periods,
    /// `Computation` when the smoother produces non-finite values.
    pub fn decompose(&self, series: &[f64]) -> Result<StlComponents> {
        let n = series.len();
        let period = self.period;
        if period < 2 || n < 2 * period {
            return Err(SeasonalityError::InsufficientData {
                needed: 2 * period.max(2),
                got: n,
            });
        }

        let scale = series.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let mut trend = initial_trend(series, period)?;
        let mut weights = vec![1.0; n];
        let mut cycle = vec![0.0; period];
        let mut seasonal = vec![0.0; n];

        let passes = if self.robust {
            self.outer_iterations + 1
        } else {
            1
        };

        for pass in 0..passes {
            for _ in 0..self.inner_iterations {
                let detrended: Vec<f64> =
                    series.iter().zip(trend.iter()).map(|(y, t)| y - t).collect();

                cycle = self.cycle_subseries(&detrended, &weights);
                for (i, s) in seasonal.iter_mut().enumerate() {
                    *s = cycle[i % period];
                }

                let deseasonalized: Vec<f64> = series
                    .iter()
                    .zip(seasonal.iter())
                    .map(|(y, s)| y - s)
                    .collect();
                trend = loess(&deseasonalized, self.trend_span, &weights);
            }

            if pass + 1 < passes {
                let remainder: Vec<f64> = (0..n).map(|i| series[i] - trend[i] - seasonal[i]).collect();
                weights = robustness_weights(&remainder, scale);
            }
        }

        let remainder: Vec<f64> = (0..n).map(|i| series[i] - trend[i] - seasonal[i]).collect();

        if trend
            .iter()
            .chain(seasonal.iter())
            .chain(remainder.iter())
            .any(|v| !v.is_finite())
        {
            return Err(SeasonalityError::Computation(
                "decomposition produced non-finite values".into(),
            ));
        }

        Ok(StlComponents {
            trend,
            seasonal,
            remainder,
            cycle,
            weights,
        })
    }

    /// One value per cycle position, centered to zero mean.
    fn cycle_subseries(&self, detrended: &[f64], weights: &[f64]) -> Vec<f64> {
        let period = self.period;
        let mut cycle = vec![0.0; period];

        for (pos, slot) in cycle.iter_mut().enumerate() {
            let subseries: Vec<(f64, f64)> = detrended
                .iter()
                .zip(weights.iter())
                .skip(pos)
                .step_by(period)
                .map(|(&v, &w)| (v, w))
                .collect();

            *slot = if self.robust {
                let kept: Vec<f64> = subseries
                    .iter()
                    .filter(|(_, w)| *w > 0.0)
                    .map(|(v, _)| *v)
                    .collect();
                if kept.is_empty() {
                    let all: Vec<f64> = subseries.iter().map(|(v, _)| *v).collect();
                    median(&all)
                } else {
                    median(&kept)
                }
            } else {
                let values: Vec<f64> = subseries.iter().map(|(v, _)| *v).collect();
                mean(&values)
            };
        }

        center(&mut cycle);
        cycle
    }
}

impl Default for Stl {
    fn default() -> Self {
        Self::new(52)
    }
}

/// Subtract the mean so the cycle sums to zero.
pub(crate) fn center(cycle: &mut [f64]) {
    let m = mean(cycle);
    if m.is_finite() {
        cycle.iter_mut().for_each(|c| *c -= m);
    }
}

/// Centered moving average over one period (2 x period for even periods).
///
/// The first and last `period / 2` entries are `NaN`.
pub(crate) fn centered_moving_average(series: &[f64], period: usize) -> Vec<f64> {
    let n = series.len();
    let half = period / 2;
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < 2 * half + 1 {
        return result;
    }

    for (i, out) in result.iter_mut().enumerate().take(n - half).skip(half) {
        *out = if period % 2 == 0 {
            let inner: f64 = series[i + 1 - half..i + half].iter().sum();
            (inner + 0.5 * (series[i - half] + series[i + half])) / period as f64
        } else {
            series[i - half..=i + half].iter().sum::<f64>() / period as f64
        };
    }
    result
}

/// Moving-average trend with the undefined edges extended by a fitted line.
fn initial_trend(series: &[f64], period: usize) -> Result<Vec<f64>> {
    let half = period / 2;
    let mut trend = centered_moving_average(series, period);
    let n = trend.len();
    let line = fit_line_indexed(&trend[half..n - half], half)?;
    for i in (0..half).chain(n - half..n) {
        trend[i] = line.at(i as f64);
    }
    Ok(trend)
}

/// Local-linear LOESS with tricube neighbourhood weights.
///
/// Each fit uses the `span` nearest points, shifted inwards at the edges.
pub(crate) fn loess(values: &[f64], span: usize, weights: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let q = span.clamp(2, n.max(2)).min(n);

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(q / 2).min(n - q);
            let end = start + q;
            let bandwidth = (i - start).max(end - 1 - i) as f64 + 1.0;

            let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for j in start..end {
                let x = j as f64 - i as f64;
                let u = x.abs() / bandwidth;
                let w = (1.0 - u.powi(3)).powi(3) * weights[j];
                sw += w;
                swx += w * x;
                swy += w * values[j];
                swxx += w * x * x;
                swxy += w * x * values[j];
            }

            if sw <= 0.0 {
                return values[i];
            }
            let x_bar = swx / sw;
            let y_bar = swy / sw;
            let sxx = swxx - sw * x_bar * x_bar;
            if sxx <= 1e-12 * swxx.max(1.0) {
                return y_bar;
            }
            let slope = (swxy - sw * x_bar * y_bar) / sxx;
            y_bar - slope * x_bar
        })
        .collect()
}

/// Bisquare weights from the remainder, with `h = 6 * median(|r|)`.
///
/// `h` is floored relative to `scale` so rounding noise in an exact fit keeps
/// full weight.
fn robustness_weights(remainder: &[f64], scale: f64) -> Vec<f64> {
    let abs: Vec<f64> = remainder.iter().map(|r| r.abs()).collect();
    let h = (6.0 * median(&abs)).max(1e-8 * scale.abs().max(1.0));

    abs.iter()
        .map(|a| {
            let u = a / h;
            if u < 1.0 {
                (1.0 - u * u).powi(2)
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn seasonal_series(n: usize, period: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + 0.5 * i as f64 + 10.0 * (2.0 * PI * i as f64 / period as f64).sin())
            .collect()
    }

    #[test]
    fn trend_span_is_odd() {
        assert_eq!(Stl::new(52).trend_span(), 81);
        assert_eq!(Stl::new(12).trend_span() % 2, 1);
        assert_eq!(Stl::new(52).with_trend_span(40).trend_span(), 41);
    }

    #[test]
    fn components_reconstruct_series() {
        let series = seasonal_series(156, 52);
        let result = Stl::new(52).decompose(&series).unwrap();
        for i in 0..series.len() {
            let sum = result.trend[i] + result.seasonal[i] + result.remainder[i];
            assert_relative_eq!(sum, series[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn cycle_is_zero_mean_and_tiled() {
        let series = seasonal_series(156, 52);
        let result = Stl::new(52).robust().decompose(&series).unwrap();
        assert_eq!(result.cycle.len(), 52);
        assert!(result.cycle.iter().sum::<f64>().abs() < 1e-9);
        for i in 0..series.len() {
            assert_eq!(result.seasonal[i], result.cycle[i % 52]);
        }
    }

    #[test]
    fn recovers_linear_trend_and_sine() {
        let series = seasonal_series(156, 52);
        let result = Stl::new(52).with_inner_iterations(5).decompose(&series).unwrap();
        // Middle of the series, away from edge effects
        for i in 52..104 {
            assert_relative_eq!(result.trend[i], 100.0 + 0.5 * i as f64, epsilon = 0.5);
        }
        let peak = result
            .cycle
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 13);
    }

    #[test]
    fn robust_fit_ignores_single_outlier() {
        let mut series = seasonal_series(156, 52);
        series[70] *= 10.0;
        let result = Stl::new(52).robust().decompose(&series).unwrap();
        assert!(result.weights[70] < 0.01);
        let spike = result.remainder[70].abs();
        let others = result
            .remainder
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 70)
            .fold(0.0_f64, |m, (_, r)| m.max(r.abs()));
        assert!(spike > 20.0 * others);
    }

    #[test]
    fn short_series_is_rejected() {
        let series = seasonal_series(80, 52);
        assert!(matches!(
            Stl::new(52).decompose(&series),
            Err(SeasonalityError::InsufficientData { needed: 104, got: 80 })
        ));
    }

    #[test]
    fn moving_average_edges_are_undefined() {
        let series: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let ma = centered_moving_average(&series, 4);
        assert!(ma[0].is_nan() && ma[1].is_nan());
        assert!(ma[18].is_nan() && ma[19].is_nan());
        // Linear input is preserved by a symmetric filter
        for i in 2..18 {
            assert_relative_eq!(ma[i], i as f64, epsilon = 1e-12);
        }
        let odd = centered_moving_average(&series, 5);
        assert!(odd[1].is_nan() && odd[2].is_finite());
        assert_relative_eq!(odd[10], 10.0, epsilon = 1e-12);
    }

    #[test]
    fn loess_reproduces_lines() {
        let values: Vec<f64> = (0..30).map(|i| 3.0 - 0.25 * i as f64).collect();
        let smoothed = loess(&values, 9, &vec![1.0; 30]);
        for (s, v) in smoothed.iter().zip(values.iter()) {
            assert_relative_eq!(s, v, epsilon = 1e-9);
        }
    }

    #[test]
    fn robustness_weights_downweight_large_residuals() {
        let mut remainder = vec![0.1, -0.1, 0.2, -0.2, 0.1, -0.1, 0.15, -0.15];
        remainder.push(50.0);
        let weights = robustness_weights(&remainder, 100.0);
        assert_eq!(weights[8], 0.0);
        assert!(weights[0] > 0.9);
        assert_eq!(robustness_weights(&[0.0; 5], 100.0), vec![1.0; 5]);
    }
}
