//! Structural breaks in the decomposition residual.

use super::pelt::{pelt_detect, PeltConfig};
use crate::detection::RELATIVE_NOISE_FLOOR;
use crate::error::SeasonalityError;
use crate::seasonality::DecompositionResult;
use crate::utils::stats::{finite_span, mean, std_dev};
use chrono::NaiveDate;
use serde::Serialize;

/// First week of a new residual regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePoint {
    pub index: usize,
    pub date: NaiveDate,
}

/// Changepoints of the residual, or an empty list with the reason the search
/// could not run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangepointReport {
    pub changepoints: Vec<ChangePoint>,
    pub penalty: Option<f64>,
    pub fallback: Option<SeasonalityError>,
}

impl ChangepointReport {
    pub fn used_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Run PELT over the defined span of the residual.
///
/// A failed search is not an error for the caller: the report is empty and
/// `fallback` holds a `ModelFit` describing the failure.
pub fn detect_changepoints(
    decomposition: &DecompositionResult,
    config: &PeltConfig,
) -> ChangepointReport {
    let (start, end) = finite_span(&decomposition.residual);
    let residual = &decomposition.residual[start..end];
    let level = mean(
        &decomposition
            .original
            .iter()
            .map(|v| v.abs())
            .collect::<Vec<_>>(),
    );

    let outcome = if residual.len() < 2 || !(std_dev(residual) > RELATIVE_NOISE_FLOOR * level) {
        Err(SeasonalityError::DegenerateSeries(
            "residual has no variance".into(),
        ))
    } else {
        pelt_detect(residual, config)
    };

    match outcome {
        Ok(result) => {
            let changepoints = result
                .changepoints
                .iter()
                .map(|&cp| ChangePoint {
                    index: start + cp,
                    date: decomposition.dates[start + cp],
                })
                .collect::<Vec<_>>();
            tracing::debug!(
                changepoints = changepoints.len(),
                penalty = result.penalty,
                "searched residual for changepoints"
            );
            ChangepointReport {
                changepoints,
                penalty: Some(result.penalty),
                fallback: None,
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "changepoint search skipped");
            ChangepointReport {
                changepoints: Vec::new(),
                penalty: None,
                fallback: Some(SeasonalityError::ModelFit(format!(
                    "changepoint search failed: {}",
                    err
                ))),
            }
        }
    }
}
