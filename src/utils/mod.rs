//! Shared numerical utilities.

pub mod ols;
pub mod optimization;
pub mod stats;

pub use ols::{fit_line, fit_line_indexed, ols_fit, LinearFit, OlsResult};
pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::{interval_multiplier, quantile_normal};
