//! Stationarity tests for time series.
//!
//! ADF takes a unit root as its null hypothesis and KPSS takes stationarity,
//! so the two are read together.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::utils::ols::ols_fit;

/// Result of a stationarity test.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationarityResult {
    pub statistic: f64,
    /// P-value (approximate)
    pub p_value: f64,
    /// Lags used by the regression or the long-run variance
    pub lags: usize,
    /// Whether the test points to a stationary series at the 5% level
    pub is_stationary: bool,
    pub critical_values: CriticalValues,
}

impl StationarityResult {
    fn unavailable(lags: usize) -> Self {
        Self {
            statistic: f64::NAN,
            p_value: f64::NAN,
            lags,
            is_stationary: false,
            critical_values: CriticalValues::default(),
        }
    }

    /// Whether the statistic could be computed.
    pub fn is_available(&self) -> bool {
        self.statistic.is_finite()
    }
}

/// Critical values at common significance levels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalValues {
    pub cv_1pct: f64,
    pub cv_5pct: f64,
    pub cv_10pct: f64,
}

/// Joint reading of ADF and KPSS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StationarityConclusion {
    /// ADF rejects a unit root and KPSS does not reject stationarity.
    Stationary,
    /// ADF keeps the unit root and KPSS rejects stationarity.
    NonStationary,
    /// The tests disagree.
    Inconclusive,
    /// At least one statistic could not be computed.
    Unavailable,
}

impl StationarityConclusion {
    pub fn tests_agree(self) -> bool {
        matches!(self, Self::Stationary | Self::NonStationary)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stationary => "stationary",
            Self::NonStationary => "non_stationary",
            Self::Inconclusive => "inconclusive",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Augmented Dickey-Fuller test with a constant.
///
/// Fits `dy[t] = a + b * y[t-1] + sum(g[i] * dy[t-i]) + e[t]` by OLS, choosing
/// the number of lagged differences up to `max_lags` (default
/// `floor((n - 1)^(1/3))`) by AIC on a common sample. The statistic is the
/// t-ratio of `b`.
///
/// # Example
/// ```
/// use revenue_seasonality::validation::adf_test;
///
/// let series: Vec<f64> = (0..200).map(|i| ((i * 17 + 13) % 97) as f64 / 50.0 - 1.0).collect();
/// let result = adf_test(&series, Some(4));
/// assert!(result.is_stationary);
/// ```
pub fn adf_test(series: &[f64], max_lags: Option<usize>) -> StationarityResult {
    let n = series.len();
    if n < 8 || series.iter().any(|v| !v.is_finite()) {
        return StationarityResult::unavailable(0);
    }

    let max_lags = max_lags
        .unwrap_or_else(|| ((n - 1) as f64).cbrt().floor() as usize)
        .min((n - 1) / 2 - 2);

    let diff: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let mut best: Option<(usize, f64, f64)> = None;
    for lag in 0..=max_lags {
        // Every lag order uses the observations from `max_lags` onward
        let Some((t_stat, aic)) = adf_regression(series, &diff, lag, max_lags) else {
            continue;
        };
        if best.map_or(true, |(_, _, b)| aic < b) {
            best = Some((lag, t_stat, aic));
        }
    }

    let Some((lags, t_stat, _)) = best else {
        return StationarityResult::unavailable(0);
    };

    let critical_values = CriticalValues {
        cv_1pct: -3.43,
        cv_5pct: -2.86,
        cv_10pct: -2.57,
    };

    StationarityResult {
        statistic: t_stat,
        p_value: mackinnon_p_value(t_stat),
        lags,
        is_stationary: t_stat < critical_values.cv_5pct,
        critical_values,
    }
}

/// t-ratio of the level coefficient and the regression AIC.
fn adf_regression(series: &[f64], diff: &[f64], lag: usize, start: usize) -> Option<(f64, f64)> {
    let y: Vec<f64> = diff[start..].to_vec();
    let rows = y.len();

    let mut columns = vec![vec![1.0; rows], series[start..start + rows].to_vec()];
    for i in 1..=lag {
        columns.push(diff[start - i..start - i + rows].to_vec());
    }

    let fit = ols_fit(&y, &columns).ok()?;
    let se = fit.std_errors[1];
    if !(se > 0.0) || !(fit.rss > 0.0) {
        return None;
    }

    let k = columns.len() as f64;
    let aic = rows as f64 * (fit.rss / rows as f64).ln() + 2.0 * k;
    Some((fit.coefficients[1] / se, aic))
}

/// MacKinnon (1994) response-surface p-value for the constant-only case.
fn mackinnon_p_value(t_stat: f64) -> f64 {
    const TAU_MAX: f64 = 2.74;
    const TAU_MIN: f64 = -18.83;
    const TAU_STAR: f64 = -1.61;

    if t_stat.is_nan() {
        return f64::NAN;
    }
    if t_stat > TAU_MAX {
        return 1.0;
    }
    if t_stat < TAU_MIN {
        return 0.0;
    }

    let z = if t_stat <= TAU_STAR {
        2.1659 + 1.4412 * t_stat + 0.038269 * t_stat * t_stat
    } else {
        1.7339 + 0.93202 * t_stat - 0.12745 * t_stat.powi(2) - 0.010368 * t_stat.powi(3)
    };
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.cdf(z),
        Err(_) => f64::NAN,
    }
}

/// KPSS test for level stationarity.
///
/// `lags` for the Bartlett long-run variance defaults to
/// `floor(4 * (n / 100)^(1/4))`.
pub fn kpss_test(series: &[f64], lags: Option<usize>) -> StationarityResult {
    let n = series.len();
    if n < 4 || series.iter().any(|v| !v.is_finite()) {
        return StationarityResult::unavailable(0);
    }

    let lags = lags
        .unwrap_or_else(|| (4.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize)
        .clamp(1, n / 2);

    let mean = series.iter().sum::<f64>() / n as f64;
    let residuals: Vec<f64> = series.iter().map(|&x| x - mean).collect();

    let numerator = residuals
        .iter()
        .scan(0.0, |cumsum, &r| {
            *cumsum += r;
            Some(*cumsum * *cumsum)
        })
        .sum::<f64>()
        / (n * n) as f64;

    // Bartlett kernel long-run variance
    let mut long_run = residuals.iter().map(|&r| r * r).sum::<f64>() / n as f64;
    for j in 1..=lags {
        let weight = 1.0 - j as f64 / (lags + 1) as f64;
        let autocov = residuals[j..]
            .iter()
            .zip(&residuals)
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / n as f64;
        long_run += 2.0 * weight * autocov;
    }

    if !(long_run > 1e-12 * mean.abs().max(1.0).powi(2)) {
        return StationarityResult::unavailable(lags);
    }

    let stat = numerator / long_run;
    let critical_values = CriticalValues {
        cv_1pct: 0.739,
        cv_5pct: 0.463,
        cv_10pct: 0.347,
    };

    StationarityResult {
        statistic: stat,
        p_value: kpss_p_value(stat),
        lags,
        is_stationary: stat < critical_values.cv_5pct,
        critical_values,
    }
}

/// P-value interpolated between tabulated critical values, clamped to
/// [0.01, 0.10] outside the table.
fn kpss_p_value(stat: f64) -> f64 {
    const TABLE: [(f64, f64); 4] = [(0.347, 0.10), (0.463, 0.05), (0.574, 0.025), (0.739, 0.01)];

    if stat.is_nan() {
        return f64::NAN;
    }
    if stat <= TABLE[0].0 {
        return TABLE[0].1;
    }
    for pair in TABLE.windows(2) {
        let ((x0, p0), (x1, p1)) = (pair[0], pair[1]);
        if stat <= x1 {
            return p0 + (p1 - p0) * (stat - x0) / (x1 - x0);
        }
    }
    TABLE[3].1
}

/// Run ADF and KPSS and report whether they agree.
pub fn test_stationarity(
    series: &[f64],
) -> (StationarityResult, StationarityResult, StationarityConclusion) {
    let adf = adf_test(series, None);
    let kpss = kpss_test(series, None);

    let conclusion = if !adf.is_available() || !kpss.is_available() {
        StationarityConclusion::Unavailable
    } else if adf.is_stationary && kpss.is_stationary {
        StationarityConclusion::Stationary
    } else if !adf.is_stationary && !kpss.is_stationary {
        StationarityConclusion::NonStationary
    } else {
        StationarityConclusion::Inconclusive
    };

    (adf, kpss, conclusion)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    fn random_walk(n: usize, seed: u64) -> Vec<f64> {
        noise(n, seed)
            .iter()
            .scan(0.0, |level, step| {
                *level += step;
                Some(*level)
            })
            .collect()
    }

    #[test]
    fn adf_rejects_unit_root_for_noise() {
        let result = adf_test(&noise(200, 61), None);
        assert!(result.is_stationary);
        assert!(result.p_value < 0.01);
    }

    #[test]
    fn adf_keeps_unit_root_for_random_walk() {
        let result = adf_test(&random_walk(200, 62), None);
        assert!(!result.is_stationary);
        assert!(result.p_value > 0.05);
    }

    #[test]
    fn kpss_accepts_noise_and_rejects_trend() {
        assert!(kpss_test(&noise(200, 63), None).is_stationary);

        let trend: Vec<f64> = (0..200).map(|i| i as f64 * 0.5).collect();
        let result = kpss_test(&trend, None);
        assert!(!result.is_stationary);
        assert_eq!(result.p_value, 0.01);
    }

    #[test]
    fn tests_agree_on_clear_cases() {
        let (_, _, conclusion) = test_stationarity(&noise(200, 64));
        assert_eq!(conclusion, StationarityConclusion::Stationary);
        assert!(conclusion.tests_agree());

        let trend: Vec<f64> = (0..200).map(|i| 10.0 + i as f64).collect();
        let mut walk = random_walk(200, 65);
        for (w, t) in walk.iter_mut().zip(&trend) {
            *w += t;
        }
        let (adf, kpss, conclusion) = test_stationarity(&walk);
        assert!(!adf.is_stationary && !kpss.is_stationary);
        assert_eq!(conclusion, StationarityConclusion::NonStationary);
    }

    #[test]
    fn constant_series_is_unavailable() {
        let (adf, kpss, conclusion) = test_stationarity(&[7.0; 60]);
        assert!(!adf.is_available());
        assert!(!kpss.is_available());
        assert_eq!(conclusion, StationarityConclusion::Unavailable);
        assert!(!conclusion.tests_agree());
    }

    #[test]
    fn p_values_are_monotone() {
        assert!(mackinnon_p_value(-4.0) < mackinnon_p_value(-2.0));
        assert!(mackinnon_p_value(-2.0) < mackinnon_p_value(0.5));
        assert!((mackinnon_p_value(-2.86) - 0.05).abs() < 0.01);
        assert!(kpss_p_value(0.2) >= kpss_p_value(0.5));
    }
}
