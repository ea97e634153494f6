//! End-to-end run over one revenue series.
//!
//! Normalize, decompose, then derive peaks, anomalies, changepoints, the
//! forecast and diagnostics from the decomposition. Each stage reads the
//! results of the stages before it and returns a new value.

use serde::Serialize;

use crate::changepoint::{detect_changepoints, ChangepointReport, PeltConfig};
use crate::config::PipelineConfig;
use crate::core::{normalize_weekly, ForecastResult, ObservedPoint, WeeklySeries};
use crate::detection::{detect_anomalies, AnomalyReport};
use crate::diagnostics::{diagnose, DiagnosticsReport};
use crate::error::{Result, SeasonalityError};
use crate::models::HybridForecaster;
use crate::peaks::{detect_peaks, planning_calendar, CalendarEntry, PeakAnalysis};
use crate::seasonality::{decompose, DecompositionConfig, DecompositionResult};

/// Every result of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub series: WeeklySeries,
    pub decomposition: DecompositionResult,
    pub peaks: PeakAnalysis,
    pub calendar: Vec<CalendarEntry>,
    pub anomalies: AnomalyReport,
    pub changepoints: ChangepointReport,
    pub forecast: ForecastResult,
    pub diagnostics: DiagnosticsReport,
}

impl PipelineOutput {
    /// Whether any stage fell back to a simpler model.
    pub fn used_fallback(&self) -> bool {
        self.diagnostics.used_fallback()
    }
}

/// Run the full analysis on raw dated observations.
///
/// # Errors
/// `Configuration` for invalid options (checked before any work),
/// `InvalidInput` for non-finite values and `InsufficientData` when fewer
/// than ten distinct weeks remain after normalization. Model failures inside
/// a stage never abort the run; they show up as fallback annotations.
///
/// # Example
/// ```
/// use chrono::{Duration, NaiveDate};
/// use revenue_seasonality::config::PipelineConfig;
/// use revenue_seasonality::core::ObservedPoint;
/// use revenue_seasonality::pipeline::run_pipeline;
///
/// let start = NaiveDate::from_ymd_opt(2022, 1, 3).unwrap();
/// let points: Vec<ObservedPoint> = (0..120)
///     .map(|t| {
///         let season = (2.0 * std::f64::consts::PI * t as f64 / 52.0).sin();
///         ObservedPoint::new(start + Duration::weeks(t), 10_000.0 + 25.0 * t as f64 + 2_000.0 * season)
///     })
///     .collect();
///
/// let output = run_pipeline(&points, &PipelineConfig::default()).unwrap();
/// assert_eq!(output.forecast.horizon, 12);
/// assert_eq!(output.decomposition.len(), 120);
/// ```
pub fn run_pipeline(points: &[ObservedPoint], config: &PipelineConfig) -> Result<PipelineOutput> {
    config.validate()?;
    let series = normalize_weekly(points)?;
    analyze_series(series, config)
}

/// Run every stage after normalization on an already weekly series.
pub fn analyze_series(series: WeeklySeries, config: &PipelineConfig) -> Result<PipelineOutput> {
    config.validate()?;

    let decomposition = decompose(&series, &decomposition_config(config));

    let peaks = detect_peaks(&decomposition, config.peak_threshold_sigma);
    let calendar = match series.last_date() {
        Some(last) => planning_calendar(&peaks, last, config.prep_lead_days),
        None => Vec::new(),
    };

    let anomalies = detect_anomalies(&decomposition, config.anomaly_iqr_multiplier);
    let changepoints = detect_changepoints(&decomposition, &pelt_config(config));

    let forecast = forecaster(config).forecast(&decomposition).map_err(|err| {
        // Settings were validated, so only a malformed decomposition lands here
        SeasonalityError::Computation(format!("forecast could not be built: {}", err))
    })?;

    let diagnostics = diagnose(&decomposition, &forecast)
        .with_series(&series)
        .with_anomalies(&anomalies)
        .with_changepoints(&changepoints);

    tracing::info!(
        weeks = series.len(),
        filled = series.filled_count(),
        consistent_peaks = peaks.detrended_peaks.consistent_weeks().count(),
        anomalies = anomalies.flagged_count(),
        changepoints = changepoints.changepoints.len(),
        used_fallback = diagnostics.used_fallback(),
        "seasonality pipeline finished"
    );

    Ok(PipelineOutput {
        series,
        decomposition,
        peaks,
        calendar,
        anomalies,
        changepoints,
        forecast,
        diagnostics,
    })
}

fn decomposition_config(config: &PipelineConfig) -> DecompositionConfig {
    DecompositionConfig::new(config.seasonal_period)
        .with_method(config.trend_method)
        .with_robust(config.robust)
}

fn pelt_config(config: &PipelineConfig) -> PeltConfig {
    let pelt = PeltConfig::default().min_segment_length(config.changepoint_min_segment);
    match config.changepoint_penalty {
        Some(penalty) => pelt.penalty(penalty),
        None => pelt,
    }
}

fn forecaster(config: &PipelineConfig) -> HybridForecaster {
    HybridForecaster::new(config.forecast_horizon)
        .with_confidence_level(config.confidence_level)
        .with_max_orders(config.max_ar_order, config.max_differencing, config.max_ma_order)
        .with_time_budget(config.arima_time_budget())
        .with_seasonal_comparison(config.compare_seasonal_arima)
}
