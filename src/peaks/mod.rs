//! Trend-bias-corrected peak and trough detection.

mod calendar;
mod detector;

pub use calendar::{next_week_occurrence, planning_calendar, CalendarEntry};
pub use detector::{
    detect_peaks, rank_weeks, Extremum, ExtremumSet, PeakAnalysis, PeakBasis, PeakOccurrence,
    PeakWeek, PeriodStat, SeasonalWeekStat, MIN_CONSISTENT_YEARS,
};
