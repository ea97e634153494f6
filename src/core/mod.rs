//! Core data structures for the weekly revenue pipeline.

mod forecast;
mod weekly_series;

pub use forecast::{ForecastPoint, ForecastResult, ResidualModel, SeasonalArimaComparison};
pub use weekly_series::{
    iso_year, normalize_weekly, week_of_year, week_start, ObservedPoint, WeeklySeries, MIN_WEEKS,
};
