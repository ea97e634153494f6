//! Raw and trend-adjusted peak/trough detection with cross-year consistency.
//!
//! A week is a peak when its signal reaches `mean + k * stdev` of that signal
//! over the whole series, and a trough when it falls to `mean - k * stdev`.
//! Raw detection uses the original values, which favours late weeks when
//! revenue grows; detrended detection uses `original - trend` and is the
//! basis for planning.

use crate::core::{iso_year, week_of_year};
use crate::seasonality::DecompositionResult;
use crate::utils::stats::{is_negligible, mean, std_dev};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Weeks must recur in this many distinct years to count as consistent.
pub const MIN_CONSISTENT_YEARS: usize = 2;

/// Which signal a peak set was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PeakBasis {
    Raw,
    Detrended,
}

/// Peak or trough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Extremum {
    Peak,
    Trough,
}

/// One week that crossed the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakOccurrence {
    pub index: usize,
    pub date: NaiveDate,
    pub week_of_year: u32,
    pub iso_year: i32,
    pub value: f64,
    /// `original - trend`; `None` where the trend is undefined.
    pub deviation_from_trend: Option<f64>,
}

/// Occurrences of one calendar week aggregated across years.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakWeek {
    pub week_of_year: u32,
    /// Most recent occurrence.
    pub date: NaiveDate,
    /// Mean original value over the occurrences.
    pub value: f64,
    /// Mean deviation from trend over occurrences with a defined trend.
    pub deviation_from_trend: f64,
    pub years_observed_as_peak: usize,
    pub is_consistent: bool,
}

/// Peaks or troughs of one basis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtremumSet {
    pub basis: PeakBasis,
    pub kind: Extremum,
    /// Cutoff on the signal; `None` when the signal has no spread.
    pub threshold: Option<f64>,
    /// Qualifying weeks in series order.
    pub occurrences: Vec<PeakOccurrence>,
    /// Calendar weeks, ranked.
    pub weeks: Vec<PeakWeek>,
}

impl ExtremumSet {
    pub fn consistent_weeks(&self) -> impl Iterator<Item = &PeakWeek> {
        self.weeks.iter().filter(|w| w.is_consistent)
    }

    pub fn week_numbers(&self) -> Vec<u32> {
        self.weeks.iter().map(|w| w.week_of_year).collect()
    }

    /// Mean date of the occurrences as days since the common era, for
    /// comparing where in the series a set concentrates.
    pub fn mean_occurrence_day(&self) -> Option<f64> {
        if self.occurrences.is_empty() {
            return None;
        }
        let days: Vec<f64> = self
            .occurrences
            .iter()
            .map(|o| f64::from(o.date.num_days_from_ce()))
            .collect();
        Some(mean(&days))
    }
}

/// Average value of one calendar week across years.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalWeekStat {
    pub week_of_year: u32,
    pub avg_value: f64,
    pub sample_count: usize,
    /// Mean of `original - trend`, `None` if the trend is never defined there.
    pub avg_detrended: Option<f64>,
}

/// Average value of a month (1-12) or quarter (1-4).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodStat {
    pub period: u32,
    pub avg_value: f64,
    pub sample_count: usize,
    pub above_overall_mean: bool,
}

/// Everything the peak detector derives from one decomposition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeakAnalysis {
    pub threshold_sigma: f64,
    pub overall_mean: f64,
    pub raw_peaks: ExtremumSet,
    pub raw_troughs: ExtremumSet,
    pub detrended_peaks: ExtremumSet,
    pub detrended_troughs: ExtremumSet,
    pub week_stats: Vec<SeasonalWeekStat>,
    pub monthly: Vec<PeriodStat>,
    pub quarterly: Vec<PeriodStat>,
}

/// Detect raw and detrended peaks and troughs and the calendar aggregates.
///
/// `threshold_sigma` must be positive; a signal without spread yields empty
/// sets rather than an error.
pub fn detect_peaks(decomposition: &DecompositionResult, threshold_sigma: f64) -> PeakAnalysis {
    let original = &decomposition.original;
    let detrended = decomposition.detrended();
    let scale = mean(&original.iter().map(|v| v.abs()).collect::<Vec<_>>());

    let weeks: Vec<u32> = decomposition.dates.iter().map(|&d| week_of_year(d)).collect();
    let years: Vec<i32> = decomposition.dates.iter().map(|&d| iso_year(d)).collect();
    let context = Context {
        decomposition,
        detrended: &detrended,
        weeks: &weeks,
        years: &years,
        scale,
        sigma: threshold_sigma,
    };

    let analysis = PeakAnalysis {
        threshold_sigma,
        overall_mean: mean(original),
        raw_peaks: context.extrema(PeakBasis::Raw, Extremum::Peak),
        raw_troughs: context.extrema(PeakBasis::Raw, Extremum::Trough),
        detrended_peaks: context.extrema(PeakBasis::Detrended, Extremum::Peak),
        detrended_troughs: context.extrema(PeakBasis::Detrended, Extremum::Trough),
        week_stats: week_stats(original, &detrended, &weeks),
        monthly: period_stats(decomposition, |d| d.month()),
        quarterly: period_stats(decomposition, |d| (d.month() - 1) / 3 + 1),
    };

    tracing::debug!(
        raw_peaks = analysis.raw_peaks.occurrences.len(),
        detrended_peaks = analysis.detrended_peaks.occurrences.len(),
        detrended_troughs = analysis.detrended_troughs.occurrences.len(),
        consistent_peaks = analysis.detrended_peaks.consistent_weeks().count(),
        "detected peaks and troughs"
    );
    analysis
}

struct Context<'a> {
    decomposition: &'a DecompositionResult,
    detrended: &'a [f64],
    weeks: &'a [u32],
    years: &'a [i32],
    scale: f64,
    sigma: f64,
}

impl Context<'_> {
    fn extrema(&self, basis: PeakBasis, kind: Extremum) -> ExtremumSet {
        let signal: &[f64] = match basis {
            PeakBasis::Raw => &self.decomposition.original,
            PeakBasis::Detrended => self.detrended,
        };
        let defined: Vec<f64> = signal.iter().copied().filter(|v| v.is_finite()).collect();

        let sd = std_dev(&defined);
        let threshold = if defined.len() < 2 || is_negligible(sd, self.scale) {
            None
        } else {
            let m = mean(&defined);
            Some(match kind {
                Extremum::Peak => m + self.sigma * sd,
                Extremum::Trough => m - self.sigma * sd,
            })
        };

        let occurrences: Vec<PeakOccurrence> = match threshold {
            Some(cut) => signal
                .iter()
                .enumerate()
                .filter(|(_, &v)| {
                    v.is_finite()
                        && match kind {
                            Extremum::Peak => v >= cut,
                            Extremum::Trough => v <= cut,
                        }
                })
                .map(|(i, _)| self.occurrence(i))
                .collect(),
            None => Vec::new(),
        };

        let weeks = rank_weeks(&occurrences, kind);
        ExtremumSet {
            basis,
            kind,
            threshold,
            occurrences,
            weeks,
        }
    }

    fn occurrence(&self, index: usize) -> PeakOccurrence {
        let deviation = self.detrended[index];
        PeakOccurrence {
            index,
            date: self.decomposition.dates[index],
            week_of_year: self.weeks[index],
            iso_year: self.years[index],
            value: self.decomposition.original[index],
            deviation_from_trend: deviation.is_finite().then_some(deviation),
        }
    }
}

/// Group occurrences by calendar week and rank them.
///
/// Order: more distinct years first, then the stronger mean deviation from
/// trend (highest for peaks, lowest for troughs), then earlier week.
pub fn rank_weeks(occurrences: &[PeakOccurrence], kind: Extremum) -> Vec<PeakWeek> {
    let mut groups: BTreeMap<u32, Vec<&PeakOccurrence>> = BTreeMap::new();
    for occ in occurrences {
        groups.entry(occ.week_of_year).or_default().push(occ);
    }

    let mut weeks: Vec<PeakWeek> = groups
        .into_iter()
        .map(|(week_of_year, group)| {
            let years: BTreeSet<i32> = group.iter().map(|o| o.iso_year).collect();
            let values: Vec<f64> = group.iter().map(|o| o.value).collect();
            let deviations: Vec<f64> = group
                .iter()
                .filter_map(|o| o.deviation_from_trend)
                .collect();
            let date = group.iter().map(|o| o.date).max().unwrap_or_default();
            PeakWeek {
                week_of_year,
                date,
                value: mean(&values),
                deviation_from_trend: if deviations.is_empty() {
                    0.0
                } else {
                    mean(&deviations)
                },
                years_observed_as_peak: years.len(),
                is_consistent: years.len() >= MIN_CONSISTENT_YEARS,
            }
        })
        .collect();

    weeks.sort_by(|a, b| {
        b.years_observed_as_peak
            .cmp(&a.years_observed_as_peak)
            .then_with(|| match kind {
                Extremum::Peak => b.deviation_from_trend.total_cmp(&a.deviation_from_trend),
                Extremum::Trough => a.deviation_from_trend.total_cmp(&b.deviation_from_trend),
            })
            .then_with(|| a.week_of_year.cmp(&b.week_of_year))
    });
    weeks
}

fn week_stats(original: &[f64], detrended: &[f64], weeks: &[u32]) -> Vec<SeasonalWeekStat> {
    let mut groups: BTreeMap<u32, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for ((&week, &value), &dt) in weeks.iter().zip(original.iter()).zip(detrended.iter()) {
        let entry = groups.entry(week).or_default();
        entry.0.push(value);
        if dt.is_finite() {
            entry.1.push(dt);
        }
    }

    groups
        .into_iter()
        .map(|(week_of_year, (values, detrended))| SeasonalWeekStat {
            week_of_year,
            avg_value: mean(&values),
            sample_count: values.len(),
            avg_detrended: (!detrended.is_empty()).then(|| mean(&detrended)),
        })
        .collect()
}

fn period_stats<F>(decomposition: &DecompositionResult, key: F) -> Vec<PeriodStat>
where
    F: Fn(NaiveDate) -> u32,
{
    let overall = mean(&decomposition.original);
    let mut groups: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (&date, &value) in decomposition.dates.iter().zip(decomposition.original.iter()) {
        groups.entry(key(date)).or_default().push(value);
    }

    groups
        .into_iter()
        .map(|(period, values)| {
            let avg_value = mean(&values);
            PeriodStat {
                period,
                avg_value,
                sample_count: values.len(),
                above_overall_mean: avg_value > overall,
            }
        })
        .collect()
}
