//! ARIMA (Autoregressive Integrated Moving Average) models.
//!
//! This module provides:
//! - ARIMA models with (p, d, q) specifications fitted by conditional sum of squares
//! - AutoArima for automatic order selection under an optional time budget
//! - Differencing helpers, including lag-`s` seasonal differencing

mod auto_arima;
mod diff;
mod model;

pub use auto_arima::{AutoArima, AutoArimaConfig};
pub use diff::{difference, integrate, seasonal_difference, suggest_differencing};
pub use model::{Arima, ArimaForecast, ArimaSpec};
