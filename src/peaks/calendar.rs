//! Planning calendar built from consistent trend-adjusted peaks and troughs.

use super::detector::{Extremum, PeakAnalysis, PeakWeek};
use crate::core::{week_of_year, week_start};
use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Upcoming occurrence of a recurring peak or trough week.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub week_of_year: u32,
    pub kind: Extremum,
    /// Monday of the next occurrence of the week after the series end.
    pub approximate_date: NaiveDate,
    pub avg_value: f64,
    pub years_observed: usize,
    pub recommended_prep_start_date: NaiveDate,
}

/// Calendar of consistent detrended peaks and troughs in date order.
pub fn planning_calendar(
    analysis: &PeakAnalysis,
    last_date: NaiveDate,
    prep_lead_days: u32,
) -> Vec<CalendarEntry> {
    let lead = Duration::days(i64::from(prep_lead_days));
    let entries = |weeks: &[PeakWeek], kind: Extremum| -> Vec<CalendarEntry> {
        weeks
            .iter()
            .filter(|w| w.is_consistent)
            .map(|w| {
                let approximate_date = next_week_occurrence(last_date, w.week_of_year);
                CalendarEntry {
                    week_of_year: w.week_of_year,
                    kind,
                    approximate_date,
                    avg_value: w.value,
                    years_observed: w.years_observed_as_peak,
                    recommended_prep_start_date: approximate_date - lead,
                }
            })
            .collect()
    };

    let mut calendar = entries(&analysis.detrended_peaks.weeks, Extremum::Peak);
    calendar.extend(entries(&analysis.detrended_troughs.weeks, Extremum::Trough));
    calendar.sort_by(|a, b| {
        a.approximate_date
            .cmp(&b.approximate_date)
            .then_with(|| a.kind.cmp(&b.kind))
    });
    calendar
}

/// Monday of the first week strictly after `after` whose week number is `week`.
pub fn next_week_occurrence(after: NaiveDate, week: u32) -> NaiveDate {
    let first = week_start(after) + Duration::weeks(1);
    (0..54)
        .map(|k| first + Duration::weeks(k))
        .find(|&d| week_of_year(d) == week)
        .unwrap_or(first)
}
