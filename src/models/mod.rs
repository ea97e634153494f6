//! Forecasting models.

pub mod arima;
mod hybrid;

pub use arima::{Arima, ArimaForecast, ArimaSpec, AutoArima, AutoArimaConfig};
pub use hybrid::{forecast_dates, HybridForecaster};
