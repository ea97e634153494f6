//! Fit diagnostics for a decomposition and its forecast.
//!
//! Collects residual autocorrelation tests, stationarity tests on the
//! original series, component strengths and contributions, and every
//! fallback annotation raised along the way. [`DiagnosticsReport::to_report`]
//! flattens it into named values for reporting collaborators.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::changepoint::ChangepointReport;
use crate::core::{ForecastResult, ResidualModel, WeeklySeries};
use crate::detection::{dominant_period, AnomalyReport, DominantPeriod};
use crate::error::SeasonalityError;
use crate::seasonality::DecompositionResult;
use crate::utils::stats::{mean, std_dev};
use crate::validation::{
    durbin_watson, ljung_box, test_stationarity, DurbinWatsonResult, LjungBoxResult,
    StationarityConclusion, StationarityResult,
};

/// Share of total absolute variation carried by each component, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentContributions {
    pub trend_pct: f64,
    pub seasonal_pct: f64,
    pub residual_pct: f64,
}

/// One value of the flat report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportValue {
    Number(f64),
    Flag(bool),
    Text(String),
    /// Statistic that could not be computed.
    Undefined,
}

impl From<f64> for ReportValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            ReportValue::Number(value)
        } else {
            ReportValue::Undefined
        }
    }
}

impl From<Option<f64>> for ReportValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(ReportValue::Undefined, ReportValue::from)
    }
}

impl From<bool> for ReportValue {
    fn from(value: bool) -> Self {
        ReportValue::Flag(value)
    }
}

impl From<usize> for ReportValue {
    fn from(value: usize) -> Self {
        ReportValue::Number(value as f64)
    }
}

impl From<&str> for ReportValue {
    fn from(value: &str) -> Self {
        ReportValue::Text(value.to_string())
    }
}

/// Diagnostics of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub n_weeks: usize,
    pub ljung_box: LjungBoxResult,
    pub durbin_watson: DurbinWatsonResult,
    pub adf: StationarityResult,
    pub kpss: StationarityResult,
    pub stationarity: StationarityConclusion,
    /// `None` when seasonal and residual variance both vanish.
    pub seasonal_strength: Option<f64>,
    pub trend_strength: Option<f64>,
    pub contributions: Option<ComponentContributions>,
    /// In-sample R² of `trend + seasonal` against the original.
    pub r_squared: Option<f64>,
    pub residual_std_dev: f64,
    pub max_reconstruction_error: f64,
    /// Strongest period of the detrended series.
    pub dominant_period: Option<DominantPeriod>,
    pub residual_model: ResidualModel,
    pub degenerate_series: bool,
    pub decomposition_fallback: Option<SeasonalityError>,
    pub forecast_fallback: Option<SeasonalityError>,
    pub changepoint_fallback: Option<SeasonalityError>,
    pub anomaly_count: Option<usize>,
    pub changepoint_count: Option<usize>,
    pub filled_weeks: Option<usize>,
    pub log_eligible: Option<bool>,
}

impl DiagnosticsReport {
    /// Whether any stage replaced its model with a fallback.
    pub fn used_fallback(&self) -> bool {
        self.decomposition_fallback.is_some()
            || self.forecast_fallback.is_some()
            || self.changepoint_fallback.is_some()
    }

    /// Add gap-filling and positivity facts from the normalized series.
    pub fn with_series(mut self, series: &WeeklySeries) -> Self {
        self.filled_weeks = Some(series.filled_count());
        self.log_eligible = Some(series.log_eligible());
        self
    }

    pub fn with_anomalies(mut self, anomalies: &AnomalyReport) -> Self {
        self.anomaly_count = Some(anomalies.flagged_count());
        self
    }

    pub fn with_changepoints(mut self, changepoints: &ChangepointReport) -> Self {
        self.changepoint_count = Some(changepoints.changepoints.len());
        self.changepoint_fallback = changepoints.fallback.clone();
        self
    }

    /// Flatten into snake_case keys.
    pub fn to_report(&self) -> BTreeMap<String, ReportValue> {
        let mut report = BTreeMap::new();
        let mut put = |key: &str, value: ReportValue| {
            report.insert(key.to_string(), value);
        };

        put("n_weeks", self.n_weeks.into());
        put("ljung_box_statistic", self.ljung_box.statistic.into());
        put("ljung_box_p_value", self.ljung_box.p_value.into());
        put("ljung_box_lags", self.ljung_box.lags.into());
        put("durbin_watson", self.durbin_watson.statistic.into());
        put("adf_statistic", self.adf.statistic.into());
        put("adf_p_value", self.adf.p_value.into());
        put("adf_stationary", self.adf.is_stationary.into());
        put("kpss_statistic", self.kpss.statistic.into());
        put("kpss_p_value", self.kpss.p_value.into());
        put("kpss_stationary", self.kpss.is_stationary.into());
        put("stationarity", self.stationarity.as_str().into());
        put("stationarity_tests_agree", self.stationarity.tests_agree().into());
        put("seasonal_strength", self.seasonal_strength.into());
        put("trend_strength", self.trend_strength.into());
        put("trend_pct", self.contributions.map(|c| c.trend_pct).into());
        put("seasonal_pct", self.contributions.map(|c| c.seasonal_pct).into());
        put("residual_pct", self.contributions.map(|c| c.residual_pct).into());
        put("r_squared", self.r_squared.into());
        put("residual_std_dev", self.residual_std_dev.into());
        put("max_reconstruction_error", self.max_reconstruction_error.into());
        put("dominant_period", self.dominant_period.map(|d| d.period).into());

        match self.residual_model {
            ResidualModel::Arima { p, d, q, aic } => {
                put("residual_model", format!("ARIMA({},{},{})", p, d, q).as_str().into());
                put("residual_model_aic", aic.into());
            }
            ResidualModel::WhiteNoise => {
                put("residual_model", "white_noise".into());
                put("residual_model_aic", ReportValue::Undefined);
            }
        }

        put("degenerate_series", self.degenerate_series.into());
        for (key, fallback) in [
            ("decomposition", &self.decomposition_fallback),
            ("forecast", &self.forecast_fallback),
            ("changepoint", &self.changepoint_fallback),
        ] {
            put(&format!("{}_used_fallback", key), fallback.is_some().into());
            if let Some(err) = fallback {
                put(&format!("{}_fallback_reason", key), err.to_string().as_str().into());
            }
        }
        put("used_fallback", self.used_fallback().into());

        if let Some(count) = self.anomaly_count {
            put("anomaly_count", count.into());
        }
        if let Some(count) = self.changepoint_count {
            put("changepoint_count", count.into());
        }
        if let Some(filled) = self.filled_weeks {
            put("filled_weeks", filled.into());
        }
        if let Some(eligible) = self.log_eligible {
            put("log_eligible", eligible.into());
        }
        report
    }
}

/// Diagnose a decomposition and the forecast built from it.
pub fn diagnose(decomposition: &DecompositionResult, forecast: &ForecastResult) -> DiagnosticsReport {
    let (start, end) = decomposition.defined_span();
    let residual = &decomposition.residual[start..end];

    let (adf, kpss, stationarity) = test_stationarity(&decomposition.original);
    if stationarity == StationarityConclusion::Inconclusive {
        tracing::debug!(
            adf = adf.statistic,
            kpss = kpss.statistic,
            "stationarity tests disagree"
        );
    }

    let detrended: Vec<f64> = decomposition.detrended()[start..end].to_vec();
    let residual_std_dev = std_dev(residual);

    DiagnosticsReport {
        n_weeks: decomposition.len(),
        ljung_box: ljung_box(residual, None, 0),
        durbin_watson: durbin_watson(residual),
        adf,
        kpss,
        stationarity,
        seasonal_strength: decomposition.seasonal_strength(),
        trend_strength: decomposition.trend_strength(),
        contributions: contributions(decomposition, start, end),
        r_squared: r_squared(&decomposition.original[start..end], residual),
        residual_std_dev: if residual_std_dev.is_finite() { residual_std_dev } else { 0.0 },
        max_reconstruction_error: decomposition.max_reconstruction_error(),
        dominant_period: dominant_period(&detrended, 2.0, detrended.len() as f64),
        residual_model: forecast.residual_model,
        degenerate_series: decomposition.is_degenerate(),
        decomposition_fallback: decomposition.fallback.clone(),
        forecast_fallback: forecast.fallback.clone(),
        changepoint_fallback: None,
        anomaly_count: None,
        changepoint_count: None,
        filled_weeks: None,
        log_eligible: None,
    }
}

/// Percentages of `sum|trend - mean(trend)| + sum|seasonal| + sum|residual|`.
fn contributions(
    decomposition: &DecompositionResult,
    start: usize,
    end: usize,
) -> Option<ComponentContributions> {
    let trend = &decomposition.trend[start..end];
    let trend_level = mean(trend);
    let trend_var: f64 = trend.iter().map(|t| (t - trend_level).abs()).sum();
    let seasonal_var: f64 = decomposition.seasonal[start..end].iter().map(|s| s.abs()).sum();
    let residual_var: f64 = decomposition.residual[start..end].iter().map(|r| r.abs()).sum();

    let total = trend_var + seasonal_var + residual_var;
    let scale = (end - start) as f64 * mean(&decomposition.original).abs().max(1.0);
    if !(total > 1e-12 * scale) {
        return None;
    }
    Some(ComponentContributions {
        trend_pct: 100.0 * trend_var / total,
        seasonal_pct: 100.0 * seasonal_var / total,
        residual_pct: 100.0 * residual_var / total,
    })
}

fn r_squared(original: &[f64], residual: &[f64]) -> Option<f64> {
    let level = mean(original);
    let total: f64 = original.iter().map(|y| (y - level).powi(2)).sum();
    if !(total > 1e-12 * level.abs().max(1.0).powi(2)) {
        return None;
    }
    let unexplained: f64 = residual.iter().map(|r| r * r).sum();
    Some(1.0 - unexplained / total)
}
