//! # revenue-seasonality
//!
//! Seasonal analysis and forecasting for weekly revenue series.
//!
//! Raw dated observations are aligned to a weekly grid, decomposed into
//! trend, annual seasonal cycle and residual, and then analysed: recurring
//! peak and trough weeks with the trend bias removed, residual anomalies,
//! changepoints, a hybrid trend + seasonal + ARIMA forecast with intervals,
//! and fit diagnostics.

// Allow some clippy warnings for cleaner code in specific cases
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::needless_range_loop)]

pub mod changepoint;
pub mod config;
pub mod core;
pub mod detection;
pub mod diagnostics;
pub mod error;
pub mod models;
pub mod peaks;
pub mod pipeline;
pub mod seasonality;
pub mod utils;
pub mod validation;

pub use error::{Result, SeasonalityError};

pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::core::{ForecastResult, ObservedPoint, WeeklySeries};
    pub use crate::diagnostics::{DiagnosticsReport, ReportValue};
    pub use crate::error::{Result, SeasonalityError};
    pub use crate::pipeline::{analyze_series, run_pipeline, PipelineOutput};
    pub use crate::seasonality::{decompose, DecompositionConfig, DecompositionResult};
}
