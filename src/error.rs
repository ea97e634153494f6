//! Error types for the seasonality pipeline.

use serde::Serialize;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, SeasonalityError>;

/// Errors that can occur while analysing a weekly series.
///
/// `InsufficientData`, `Configuration` and `InvalidInput` abort a run. The
/// remaining kinds are absorbed by the stage that raised them and surface as
/// fallback annotations on that stage's result.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub enum SeasonalityError {
    /// Not enough weekly points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid configuration option.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Input observation could not be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Series has no variation.
    #[error("degenerate series: {0}")]
    DegenerateSeries(String),

    /// A model could not be fitted.
    #[error("model fit failure: {0}")]
    ModelFit(String),

    /// Numerical problem during a computation.
    #[error("computation error: {0}")]
    Computation(String),
}

impl SeasonalityError {
    /// Whether this error aborts a pipeline run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SeasonalityError::InsufficientData { .. }
                | SeasonalityError::Configuration(_)
                | SeasonalityError::InvalidInput(_)
        )
    }
}
