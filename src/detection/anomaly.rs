//! Residual anomaly detection.
//!
//! Flags weeks whose decomposition residual is large relative to the
//! interquartile range of all residuals. Working on residuals rather than raw
//! values keeps growth and seasonality from producing false alarms.

use crate::seasonality::DecompositionResult;
use crate::utils::stats::{finite_values, iqr, mean};
use chrono::NaiveDate;
use serde::Serialize;

/// Residuals below this fraction of the mean absolute level are rounding noise.
pub const RELATIVE_NOISE_FLOOR: f64 = 1e-6;

/// Score of one week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub index: usize,
    pub date: NaiveDate,
    pub residual_value: f64,
    pub exceeds_threshold: bool,
}

/// Result of residual anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub iqr: f64,
    /// `|residual|` must exceed this to be flagged.
    pub threshold: f64,
    /// One entry per week with a defined residual.
    pub points: Vec<Anomaly>,
}

impl AnomalyReport {
    /// Weeks that exceed the threshold.
    pub fn flagged(&self) -> impl Iterator<Item = &Anomaly> {
        self.points.iter().filter(|a| a.exceeds_threshold)
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged().count()
    }

    pub fn is_anomaly(&self, index: usize) -> bool {
        self.flagged().any(|a| a.index == index)
    }
}

/// Flag weeks where `|residual| > iqr_multiplier * IQR(residual)`.
///
/// The cutoff never drops below [`RELATIVE_NOISE_FLOOR`] times the mean
/// absolute original value, so an exact decomposition reports no anomalies.
/// Weeks with an undefined residual are skipped.
pub fn detect_anomalies(decomposition: &DecompositionResult, iqr_multiplier: f64) -> AnomalyReport {
    let residuals = finite_values(&decomposition.residual);
    let spread = if residuals.is_empty() { 0.0 } else { iqr(&residuals) };
    let level = mean(
        &decomposition
            .original
            .iter()
            .map(|v| v.abs())
            .collect::<Vec<_>>(),
    );
    let floor = RELATIVE_NOISE_FLOOR * if level.is_finite() { level } else { 0.0 };
    let threshold = (iqr_multiplier * spread).max(floor);

    let points: Vec<Anomaly> = decomposition
        .residual
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_finite())
        .map(|(index, &r)| Anomaly {
            index,
            date: decomposition.dates[index],
            residual_value: r,
            exceeds_threshold: r.abs() > threshold,
        })
        .collect();

    let report = AnomalyReport {
        iqr: spread,
        threshold,
        points,
    };
    tracing::debug!(
        threshold = report.threshold,
        flagged = report.flagged_count(),
        "scored residual anomalies"
    );
    report
}
