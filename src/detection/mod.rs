//! Detection utilities for the decomposed series.
//!
//! - Residual anomalies (IQR fence)
//! - Periodogram and dominant period

mod anomaly;
mod fft;

pub use anomaly::{detect_anomalies, Anomaly, AnomalyReport, RELATIVE_NOISE_FLOOR};
pub use fft::{dominant_period, fft_real, periodogram, DominantPeriod};
