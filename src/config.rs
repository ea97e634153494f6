//! Pipeline configuration.
//!
//! Every option is optional; missing keys take the documented defaults. The
//! serialized names are camelCase so reporting collaborators can pass
//! `{"forecastHorizon": 26}` straight through.

use crate::error::{Result, SeasonalityError};
use crate::seasonality::TrendMethod;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Weekly data with annual seasonality.
pub const DEFAULT_SEASONAL_PERIOD: usize = 52;

/// Recognised pipeline options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Seasonal period in weeks.
    pub seasonal_period: usize,
    /// Peak/trough threshold in standard deviations from the mean.
    pub peak_threshold_sigma: f64,
    /// Number of weeks to forecast.
    pub forecast_horizon: usize,
    /// Multiplier applied to the residual IQR for anomaly flagging.
    pub anomaly_iqr_multiplier: f64,
    /// Coverage of the forecast interval.
    pub confidence_level: f64,
    /// Trend smoother used by the decomposition.
    pub trend_method: TrendMethod,
    /// Down-weight outliers while decomposing.
    pub robust: bool,
    /// Penalty per additional changepoint; `None` uses `3 * ln(n)`.
    pub changepoint_penalty: Option<f64>,
    /// Minimum number of weeks between changepoints.
    pub changepoint_min_segment: usize,
    /// Largest AR order tried for the residual model.
    pub max_ar_order: usize,
    /// Largest MA order tried for the residual model.
    pub max_ma_order: usize,
    /// Largest differencing order tried for the residual model.
    pub max_differencing: usize,
    /// Wall-clock budget for the residual ARIMA order search, in milliseconds.
    pub arima_time_budget_ms: Option<u64>,
    /// Also fit a direct seasonal ARIMA on the original series for comparison.
    pub compare_seasonal_arima: bool,
    /// Days between the preparation start and a calendar peak.
    pub prep_lead_days: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seasonal_period: DEFAULT_SEASONAL_PERIOD,
            peak_threshold_sigma: 1.0,
            forecast_horizon: 12,
            anomaly_iqr_multiplier: 1.5,
            confidence_level: 0.80,
            trend_method: TrendMethod::Loess,
            robust: true,
            changepoint_penalty: None,
            changepoint_min_segment: 8,
            max_ar_order: 3,
            max_ma_order: 3,
            max_differencing: 1,
            arima_time_budget_ms: None,
            compare_seasonal_arima: true,
            prep_lead_days: 21,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the seasonal period.
    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal_period = period;
        self
    }

    /// Set the peak threshold in standard deviations.
    pub fn with_peak_threshold_sigma(mut self, sigma: f64) -> Self {
        self.peak_threshold_sigma = sigma;
        self
    }

    /// Set the forecast horizon.
    pub fn with_forecast_horizon(mut self, horizon: usize) -> Self {
        self.forecast_horizon = horizon;
        self
    }

    /// Set the anomaly IQR multiplier.
    pub fn with_anomaly_iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.anomaly_iqr_multiplier = multiplier;
        self
    }

    /// Set the forecast interval coverage.
    pub fn with_confidence_level(mut self, level: f64) -> Self {
        self.confidence_level = level;
        self
    }

    /// Set the trend smoother.
    pub fn with_trend_method(mut self, method: TrendMethod) -> Self {
        self.trend_method = method;
        self
    }

    /// Enable or disable robust decomposition.
    pub fn with_robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    /// Set a fixed changepoint penalty.
    pub fn with_changepoint_penalty(mut self, penalty: f64) -> Self {
        self.changepoint_penalty = Some(penalty);
        self
    }

    /// Set the wall-clock budget of the residual ARIMA order search.
    pub fn with_arima_time_budget(mut self, budget: Duration) -> Self {
        self.arima_time_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    /// Enable or disable the direct seasonal ARIMA comparison.
    pub fn with_seasonal_arima_comparison(mut self, enabled: bool) -> Self {
        self.compare_seasonal_arima = enabled;
        self
    }

    /// Budget of the order search as a `Duration`.
    pub fn arima_time_budget(&self) -> Option<Duration> {
        self.arima_time_budget_ms.map(Duration::from_millis)
    }

    /// Check every option. Runs before any computation.
    pub fn validate(&self) -> Result<()> {
        if self.seasonal_period < 2 {
            return Err(SeasonalityError::Configuration(format!(
                "seasonalPeriod must be at least 2, got {}",
                self.seasonal_period
            )));
        }
        if !(self.peak_threshold_sigma.is_finite() && self.peak_threshold_sigma > 0.0) {
            return Err(SeasonalityError::Configuration(format!(
                "peakThresholdSigma must be positive, got {}",
                self.peak_threshold_sigma
            )));
        }
        if self.forecast_horizon == 0 {
            return Err(SeasonalityError::Configuration(
                "forecastHorizon must be positive".into(),
            ));
        }
        if !(self.anomaly_iqr_multiplier.is_finite() && self.anomaly_iqr_multiplier > 0.0) {
            return Err(SeasonalityError::Configuration(format!(
                "anomalyIqrMultiplier must be positive, got {}",
                self.anomaly_iqr_multiplier
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(SeasonalityError::Configuration(format!(
                "confidenceLevel must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.changepoint_min_segment < 2 {
            return Err(SeasonalityError::Configuration(format!(
                "changepointMinSegment must be at least 2, got {}",
                self.changepoint_min_segment
            )));
        }
        if let Some(penalty) = self.changepoint_penalty {
            if !(penalty.is_finite() && penalty >= 0.0) {
                return Err(SeasonalityError::Configuration(format!(
                    "changepointPenalty must be non-negative, got {}",
                    penalty
                )));
            }
        }
        Ok(())
    }
}
