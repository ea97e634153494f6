//! Statistical tests on decomposition residuals and the original series.
//!
//! # Example
//!
//! ```
//! use revenue_seasonality::validation::{durbin_watson, ljung_box, test_stationarity};
//!
//! let residuals = vec![0.1, -0.2, 0.15, -0.1, 0.05, -0.08, 0.12, -0.15, 0.1, -0.05];
//! let lb = ljung_box(&residuals, Some(3), 0);
//! let dw = durbin_watson(&residuals);
//! assert!(lb.p_value.is_finite());
//! assert!(dw.statistic > 2.0);
//!
//! let series: Vec<f64> = (0..120).map(|i| ((i * 37) % 23) as f64).collect();
//! let (adf, kpss, conclusion) = test_stationarity(&series);
//! println!("{} / {} -> {}", adf.statistic, kpss.statistic, conclusion.as_str());
//! ```

pub mod stationarity;

pub use residual_tests::{
    durbin_watson, ljung_box, AutocorrelationType, DurbinWatsonResult, LjungBoxResult,
};
pub use stationarity::{
    adf_test, kpss_test, test_stationarity, CriticalValues, StationarityConclusion,
    StationarityResult,
};
