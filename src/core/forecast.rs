//! Forecast result structure for the hybrid forecaster.

use crate::error::SeasonalityError;
use chrono::NaiveDate;
use serde::Serialize;

/// Model used for the residual part of a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ResidualModel {
    /// Non-seasonal ARIMA(p, d, q) selected by AIC.
    Arima { p: usize, d: usize, q: usize, aic: f64 },
    /// Zero forecast with constant spread.
    WhiteNoise,
}

/// Direct seasonal ARIMA fitted on the original series for comparison only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalArimaComparison {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    /// Seasonal differencing lag.
    pub seasonal_lag: usize,
    pub aic: f64,
    /// `aic - hybrid residual aic`; positive when the hybrid model fits better.
    pub aic_delta: Option<f64>,
}

/// One forecast step keyed by its date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub point_forecast: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Point forecast, interval bounds and the components they were built from.
///
/// Every vector has length `horizon`. Trend and seasonal parts are treated as
/// deterministic, so the interval only reflects residual uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastResult {
    pub horizon: usize,
    pub dates: Vec<NaiveDate>,
    pub point_forecast: Vec<f64>,
    pub lower_bound: Vec<f64>,
    pub upper_bound: Vec<f64>,
    pub trend_component: Vec<f64>,
    pub seasonal_component: Vec<f64>,
    pub residual_component: Vec<f64>,
    /// Standard error of the residual forecast at each step.
    pub std_errors: Vec<f64>,
    pub confidence_level: f64,
    pub residual_model: ResidualModel,
    /// Reason the white-noise fallback was used, if it was.
    pub fallback: Option<SeasonalityError>,
    pub seasonal_arima: Option<SeasonalArimaComparison>,
}

impl ForecastResult {
    /// Whether the residual model fell back to white noise.
    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Forecast steps keyed by date.
    pub fn points(&self) -> Vec<ForecastPoint> {
        (0..self.horizon)
            .map(|h| ForecastPoint {
                date: self.dates[h],
                point_forecast: self.point_forecast[h],
                lower_bound: self.lower_bound[h],
                upper_bound: self.upper_bound[h],
            })
            .collect()
    }

    /// Width of the interval at step `h`.
    pub fn interval_width(&self, h: usize) -> Option<f64> {
        Some(self.upper_bound.get(h)? - self.lower_bound.get(h)?)
    }

    /// AIC of the residual model, if one was fitted.
    pub fn residual_aic(&self) -> Option<f64> {
        match self.residual_model {
            ResidualModel::Arima { aic, .. } => Some(aic),
            ResidualModel::WhiteNoise => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(fallback: Option<SeasonalityError>) -> ForecastResult {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        ForecastResult {
            horizon: 2,
            dates: vec![start, start + chrono::Duration::weeks(1)],
            point_forecast: vec![10.0, 11.0],
            lower_bound: vec![8.0, 8.5],
            upper_bound: vec![12.0, 13.5],
            trend_component: vec![9.0, 9.5],
            seasonal_component: vec![1.0, 1.5],
            residual_component: vec![0.0, 0.0],
            std_errors: vec![1.5, 2.0],
            confidence_level: 0.8,
            residual_model: if fallback.is_some() {
                ResidualModel::WhiteNoise
            } else {
                ResidualModel::Arima {
                    p: 1,
                    d: 0,
                    q: 0,
                    aic: 120.0,
                }
            },
            fallback,
            seasonal_arima: None,
        }
    }

    #[test]
    fn points_are_keyed_by_date() {
        let result = sample(None);
        let points = result.points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].date, result.dates[1]);
        assert_relative_eq!(points[1].upper_bound, 13.5);
        assert_relative_eq!(result.interval_width(1).unwrap(), 5.0);
        assert!(result.interval_width(2).is_none());
    }

    #[test]
    fn fallback_flag_follows_annotation() {
        assert!(!sample(None).used_fallback());
        assert_eq!(sample(None).residual_aic(), Some(120.0));
        let result = sample(Some(SeasonalityError::ModelFit("no candidate".into())));
        assert!(result.used_fallback());
        assert_eq!(result.residual_aic(), None);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(sample(None)).unwrap();
        assert!(json.get("pointForecast").is_some());
        assert_eq!(json["residualModel"]["kind"], "arima");
    }
}
