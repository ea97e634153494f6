//! Hybrid decomposition forecaster.
//!
//! Forecasts each decomposition component separately and adds them up:
//! 1. Extrapolates the trend with a straight line fitted to its defined span
//! 2. Repeats the seasonal cycle at the phase following the last observation
//! 3. Forecasts the residual with an automatically selected ARIMA model
//!
//! The interval only reflects residual uncertainty; trend and seasonal parts
//! are treated as known.

use std::time::Duration;

use chrono::{Duration as CalendarDuration, NaiveDate};

use crate::core::{ForecastResult, ResidualModel, SeasonalArimaComparison};
use crate::error::{Result, SeasonalityError};
use crate::models::arima::{seasonal_difference, AutoArima, AutoArimaConfig};
use crate::seasonality::DecompositionResult;
use crate::utils::ols::fit_line_indexed;
use crate::utils::stats::{interval_multiplier, std_dev};

/// Forecaster combining trend, seasonal and residual extrapolations.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use revenue_seasonality::core::WeeklySeries;
/// use revenue_seasonality::models::HybridForecaster;
/// use revenue_seasonality::seasonality::{decompose, DecompositionConfig};
///
/// let values: Vec<f64> = (0..156)
///     .map(|t| 1_000.0 + 2.0 * t as f64 + 80.0 * (t as f64 * 0.1208).sin() + (t % 5) as f64)
///     .collect();
/// let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
/// let series = WeeklySeries::from_values(start, values).unwrap();
/// let decomposition = decompose(&series, &DecompositionConfig::default());
///
/// let forecast = HybridForecaster::new(12).forecast(&decomposition).unwrap();
/// assert_eq!(forecast.point_forecast.len(), 12);
/// assert!(forecast.lower_bound[0] <= forecast.upper_bound[0]);
/// ```
#[derive(Debug, Clone)]
pub struct HybridForecaster {
    horizon: usize,
    confidence_level: f64,
    arima: AutoArimaConfig,
    compare_seasonal: bool,
}

impl HybridForecaster {
    /// Create a forecaster for `horizon` weeks with an 80% interval.
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            confidence_level: 0.80,
            arima: AutoArimaConfig::default(),
            compare_seasonal: false,
        }
    }

    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    /// Set the order limits of the residual model search.
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.arima = self.arima.with_max_orders(max_p, max_d, max_q);
        self
    }

    /// Limit the wall-clock time spent on each ARIMA order search.
    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.arima = self.arima.with_time_budget(budget);
        self
    }

    /// Also fit a seasonally differenced ARIMA on the original series.
    pub fn with_seasonal_comparison(mut self, enabled: bool) -> Self {
        self.compare_seasonal = enabled;
        self
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Forecast the weeks following the decomposed series.
    ///
    /// A failed residual model is not an error: the residual forecast becomes
    /// zero with the in-sample residual standard deviation as its spread, and
    /// `fallback` records the failure.
    ///
    /// # Errors
    /// `Configuration` for a zero horizon or a confidence level outside (0, 1),
    /// `InsufficientData` when the decomposition has fewer than two defined
    /// trend values.
    pub fn forecast(&self, decomposition: &DecompositionResult) -> Result<ForecastResult> {
        if self.horizon == 0 {
            return Err(SeasonalityError::Configuration(
                "forecast horizon must be at least 1".into(),
            ));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(SeasonalityError::Configuration(format!(
                "confidence level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }

        let n = decomposition.len();
        let (start, end) = decomposition.defined_span();
        if end - start < 2 {
            return Err(SeasonalityError::InsufficientData {
                needed: 2,
                got: end - start,
            });
        }

        let trend_component = self.extrapolate_trend(decomposition, start, end)?;
        let seasonal_component: Vec<f64> = (0..self.horizon)
            .map(|h| decomposition.seasonal_at(n + h))
            .collect();

        // Residual forecasts start right after the last defined residual
        let gap = n - end;
        let residual = &decomposition.residual[start..end];
        let (residual_component, std_errors, residual_model, fallback) =
            match self.forecast_residual(residual, gap) {
                Ok(outcome) => (outcome.0, outcome.1, outcome.2, None),
                Err(err) => {
                    tracing::warn!(error = %err, "residual ARIMA failed, using white-noise residual");
                    let spread = std_dev(residual);
                    let spread = if spread.is_finite() { spread } else { 0.0 };
                    (
                        vec![0.0; self.horizon],
                        vec![spread; self.horizon],
                        ResidualModel::WhiteNoise,
                        Some(SeasonalityError::ModelFit(format!(
                            "residual ARIMA search failed: {}",
                            err
                        ))),
                    )
                }
            };

        let z = interval_multiplier(self.confidence_level);
        let point_forecast: Vec<f64> = (0..self.horizon)
            .map(|h| trend_component[h] + seasonal_component[h] + residual_component[h])
            .collect();
        let lower_bound = point_forecast
            .iter()
            .zip(&std_errors)
            .map(|(p, se)| p - z * se)
            .collect();
        let upper_bound = point_forecast
            .iter()
            .zip(&std_errors)
            .map(|(p, se)| p + z * se)
            .collect();

        let dates = match decomposition.dates.last() {
            Some(&last) => forecast_dates(last, self.horizon),
            None => Vec::new(),
        };

        let seasonal_arima = if self.compare_seasonal {
            self.seasonal_comparison(decomposition, &residual_model)
        } else {
            None
        };

        tracing::debug!(
            horizon = self.horizon,
            fallback = fallback.is_some(),
            "built hybrid forecast"
        );

        Ok(ForecastResult {
            horizon: self.horizon,
            dates,
            point_forecast,
            lower_bound,
            upper_bound,
            trend_component,
            seasonal_component,
            residual_component,
            std_errors,
            confidence_level: self.confidence_level,
            residual_model,
            fallback,
            seasonal_arima,
        })
    }

    /// Continue the last defined trend value along the fitted slope.
    fn extrapolate_trend(
        &self,
        decomposition: &DecompositionResult,
        start: usize,
        end: usize,
    ) -> Result<Vec<f64>> {
        let n = decomposition.len();
        let line = fit_line_indexed(&decomposition.trend[start..end], start)?;
        let last_index = end - 1;
        let last_value = decomposition.trend[last_index];
        Ok((0..self.horizon)
            .map(|h| last_value + line.slope * (n + h - last_index) as f64)
            .collect())
    }

    /// Residual forecast, standard errors and the selected model.
    fn forecast_residual(
        &self,
        residual: &[f64],
        gap: usize,
    ) -> Result<(Vec<f64>, Vec<f64>, ResidualModel)> {
        let mut auto = AutoArima::with_config(self.arima.clone());
        auto.fit(residual)?;
        let forecast = auto.predict(gap + self.horizon)?;

        let (spec, aic) = match (auto.selected_spec(), auto.aic()) {
            (Some(spec), Some(aic)) => (spec, aic),
            _ => {
                return Err(SeasonalityError::ModelFit(
                    "ARIMA search selected no model".into(),
                ))
            }
        };
        Ok((
            forecast.mean[gap..].to_vec(),
            forecast.std_errors[gap..].to_vec(),
            ResidualModel::Arima {
                p: spec.p,
                d: spec.d,
                q: spec.q,
                aic,
            },
        ))
    }

    /// ARIMA on the lag-`period` differences of the original series.
    fn seasonal_comparison(
        &self,
        decomposition: &DecompositionResult,
        residual_model: &ResidualModel,
    ) -> Option<SeasonalArimaComparison> {
        let lag = decomposition.period;
        let differenced = seasonal_difference(&decomposition.original, 1, lag);
        let mut auto = AutoArima::with_config(self.arima.clone());
        if let Err(err) = auto.fit(&differenced) {
            tracing::debug!(error = %err, "seasonal ARIMA comparison skipped");
            return None;
        }

        let spec = auto.selected_spec()?;
        let aic = auto.aic()?;
        let aic_delta = match residual_model {
            ResidualModel::Arima { aic: hybrid, .. } => Some(aic - hybrid),
            ResidualModel::WhiteNoise => None,
        };
        Some(SeasonalArimaComparison {
            p: spec.p,
            d: spec.d,
            q: spec.q,
            seasonal_lag: lag,
            aic,
            aic_delta,
        })
    }
}

impl Default for HybridForecaster {
    fn default() -> Self {
        Self::new(12)
    }
}

/// Weekly dates following `last`.
pub fn forecast_dates(last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon)
        .map(|h| last + CalendarDuration::weeks(h as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{week_of_year, WeeklySeries};
    use crate::seasonality::{decompose, DecompositionConfig, TrendMethod};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 4).unwrap()
    }

    fn noisy_series(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|t| {
                10_000.0 + 20.0 * t as f64
                    + 1_500.0 * (2.0 * PI * t as f64 / 52.0).sin()
                    + rng.gen_range(-200.0..200.0)
            })
            .collect()
    }

    fn decomposition(values: Vec<f64>, method: TrendMethod) -> DecompositionResult {
        let series = WeeklySeries::from_values(start(), values).unwrap();
        decompose(&series, &DecompositionConfig::default().with_method(method))
    }

    #[test]
    fn components_add_up_to_point_forecast() {
        let d = decomposition(noisy_series(156, 41), TrendMethod::Loess);
        let forecast = HybridForecaster::new(12).forecast(&d).unwrap();
        assert_eq!(forecast.horizon, 12);
        for h in 0..12 {
            assert_relative_eq!(
                forecast.point_forecast[h],
                forecast.trend_component[h] + forecast.seasonal_component[h] + forecast.residual_component[h],
                epsilon = 1e-9
            );
            assert!(forecast.lower_bound[h] <= forecast.point_forecast[h]);
            assert!(forecast.point_forecast[h] <= forecast.upper_bound[h]);
        }
        assert!(!forecast.used_fallback());
    }

    #[test]
    fn seasonal_component_continues_the_cycle() {
        let d = decomposition(noisy_series(110, 42), TrendMethod::Loess);
        let forecast = HybridForecaster::new(8).forecast(&d).unwrap();
        for h in 0..8 {
            assert_eq!(forecast.seasonal_component[h], d.cycle[(110 + h) % 52]);
        }
    }

    #[test]
    fn forecast_dates_follow_last_week() {
        let d = decomposition(noisy_series(110, 43), TrendMethod::Loess);
        let forecast = HybridForecaster::new(3).forecast(&d).unwrap();
        let last = *d.dates.last().unwrap();
        assert_eq!(forecast.dates[0], last + CalendarDuration::weeks(1));
        assert_eq!(forecast.dates[2], last + CalendarDuration::weeks(3));
        assert_eq!(
            week_of_year(forecast.dates[0]),
            week_of_year(last) % 52 + 1
        );
    }

    #[test]
    fn linear_trend_is_extrapolated() {
        let values: Vec<f64> = (0..156)
            .map(|t| 5_000.0 + 30.0 * t as f64 + 400.0 * (2.0 * PI * t as f64 / 52.0).cos())
            .collect();
        let d = decomposition(values, TrendMethod::Loess);
        let forecast = HybridForecaster::new(4).forecast(&d).unwrap();
        assert_relative_eq!(forecast.trend_component[0], 5_000.0 + 30.0 * 156.0, max_relative = 1e-3);
        assert_relative_eq!(
            forecast.trend_component[3] - forecast.trend_component[0],
            90.0,
            max_relative = 1e-2
        );
    }

    #[test]
    fn moving_average_trend_skips_the_undefined_edge() {
        let d = decomposition(noisy_series(156, 44), TrendMethod::MovingAverage);
        let forecast = HybridForecaster::new(6).forecast(&d).unwrap();
        assert!(forecast.point_forecast.iter().all(|v| v.is_finite()));
        assert!(forecast.std_errors.iter().all(|se| se.is_finite()));
    }

    #[test]
    fn constant_series_falls_back_to_white_noise() {
        let d = decomposition(vec![50_000.0; 60], TrendMethod::Loess);
        let forecast = HybridForecaster::new(5).forecast(&d).unwrap();
        assert!(forecast.used_fallback());
        assert_eq!(forecast.residual_model, ResidualModel::WhiteNoise);
        assert!(forecast.point_forecast.iter().all(|&v| (v - 50_000.0).abs() < 1e-6));
        assert_eq!(forecast.interval_width(0), Some(0.0));
    }

    #[test]
    fn higher_confidence_widens_interval() {
        let d = decomposition(noisy_series(156, 45), TrendMethod::Loess);
        let narrow = HybridForecaster::new(4).forecast(&d).unwrap();
        let wide = HybridForecaster::new(4)
            .with_confidence_level(0.95)
            .forecast(&d)
            .unwrap();
        assert!(wide.interval_width(0).unwrap() > narrow.interval_width(0).unwrap());
    }

    #[test]
    fn seasonal_comparison_reports_delta() {
        let d = decomposition(noisy_series(156, 46), TrendMethod::Loess);
        let forecast = HybridForecaster::new(4)
            .with_seasonal_comparison(true)
            .forecast(&d)
            .unwrap();
        let comparison = forecast.seasonal_arima.unwrap();
        assert_eq!(comparison.seasonal_lag, 52);
        assert!(comparison.aic.is_finite());
        assert_relative_eq!(
            comparison.aic_delta.unwrap(),
            comparison.aic - forecast.residual_aic().unwrap(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let d = decomposition(noisy_series(110, 47), TrendMethod::Loess);
        assert!(matches!(
            HybridForecaster::new(0).forecast(&d),
            Err(SeasonalityError::Configuration(_))
        ));
        assert!(matches!(
            HybridForecaster::new(4).with_confidence_level(1.0).forecast(&d),
            Err(SeasonalityError::Configuration(_))
        ));
    }
}
