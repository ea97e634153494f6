//! Weekly revenue series and the normalizer that builds it.

use crate::error::{Result, SeasonalityError};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum number of distinct weeks a run needs.
pub const MIN_WEEKS: usize = 10;

/// A single dated revenue observation as delivered by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl ObservedPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Monday of the ISO week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// ISO week number in `1..=52`; week 53 folds into 52.
pub fn week_of_year(date: NaiveDate) -> u32 {
    date.iso_week().week().min(52)
}

/// ISO week-based year of `date`.
pub fn iso_year(date: NaiveDate) -> i32 {
    date.iso_week().year()
}

/// Gap-free series of weekly totals, one entry per ISO week.
///
/// Dates are Mondays exactly seven days apart. Weeks missing from the input
/// were filled and are marked in [`WeeklySeries::filled`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
    filled: Vec<bool>,
}

impl WeeklySeries {
    /// Build a series of consecutive weeks starting at the week containing `start`.
    ///
    /// # Example
    /// ```
    /// use chrono::NaiveDate;
    /// use revenue_seasonality::core::WeeklySeries;
    ///
    /// let start = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
    /// let series = WeeklySeries::from_values(start, vec![1.0; 12]).unwrap();
    /// assert_eq!(series.len(), 12);
    /// assert_eq!(series.dates()[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    /// ```
    pub fn from_values(start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        if values.len() < MIN_WEEKS {
            return Err(SeasonalityError::InsufficientData {
                needed: MIN_WEEKS,
                got: values.len(),
            });
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(SeasonalityError::InvalidInput(format!(
                "value at week {} is not finite",
                pos
            )));
        }
        if let Some(pos) = values.iter().position(|v| *v < 0.0) {
            return Err(SeasonalityError::InvalidInput(format!(
                "value at week {} is negative",
                pos
            )));
        }
        let first = week_start(start);
        let dates = (0..values.len())
            .map(|i| first + Duration::weeks(i as i64))
            .collect();
        let filled = vec![false; values.len()];
        Ok(Self {
            dates,
            values,
            filled,
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Per-week flag, `true` where the value was carried from a neighbour.
    pub fn filled(&self) -> &[bool] {
        &self.filled
    }

    /// Number of weeks that were filled rather than observed.
    pub fn filled_count(&self) -> usize {
        self.filled.iter().filter(|&&f| f).count()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Whether a log transform could be applied (every value strictly positive).
    pub fn log_eligible(&self) -> bool {
        self.values.iter().all(|&v| v > 0.0)
    }

    /// ISO week number of each entry.
    pub fn weeks_of_year(&self) -> Vec<u32> {
        self.dates.iter().map(|&d| week_of_year(d)).collect()
    }

    /// Distinct ISO years covered by the series, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.dates.iter().map(|&d| iso_year(d)).collect();
        years.dedup();
        years
    }
}

/// Align raw observations to a gap-free weekly grid.
///
/// Each date is floored to the Monday of its ISO week and same-week values are
/// summed. Missing weeks between the first and last week take the previous
/// week's total, then any leading gap takes the next observed total.
///
/// # Errors
/// `InsufficientData` when fewer than ten distinct weeks remain, `InvalidInput`
/// when a value is not finite or is negative.
pub fn normalize_weekly(points: &[ObservedPoint]) -> Result<WeeklySeries> {
    if let Some(bad) = points.iter().find(|p| !p.value.is_finite()) {
        return Err(SeasonalityError::InvalidInput(format!(
            "observation on {} has non-finite value {}",
            bad.date, bad.value
        )));
    }
    if let Some(bad) = points.iter().find(|p| p.value < 0.0) {
        return Err(SeasonalityError::InvalidInput(format!(
            "observation on {} has negative value {}",
            bad.date, bad.value
        )));
    }

    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for point in points {
        *buckets.entry(week_start(point.date)).or_insert(0.0) += point.value;
    }

    if buckets.len() < MIN_WEEKS {
        return Err(SeasonalityError::InsufficientData {
            needed: MIN_WEEKS,
            got: buckets.len(),
        });
    }

    let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => {
            return Err(SeasonalityError::InsufficientData {
                needed: MIN_WEEKS,
                got: 0,
            })
        }
    };

    let n = ((last - first).num_days() / 7) as usize + 1;
    let dates: Vec<NaiveDate> = (0..n)
        .map(|i| first + Duration::weeks(i as i64))
        .collect();
    let observed: Vec<Option<f64>> = dates.iter().map(|d| buckets.get(d).copied()).collect();
    let filled: Vec<bool> = observed.iter().map(Option::is_none).collect();

    let mut values = Vec::with_capacity(n);
    let mut carry: Option<f64> = None;
    for slot in &observed {
        if slot.is_some() {
            carry = *slot;
        }
        values.push(carry);
    }
    let mut next: Option<f64> = None;
    for (value, slot) in values.iter_mut().zip(observed.iter()).rev() {
        if slot.is_some() {
            next = *slot;
        }
        if value.is_none() {
            *value = next;
        }
    }
    let values: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(0.0)).collect();

    tracing::debug!(
        observations = points.len(),
        weeks = n,
        filled = filled.iter().filter(|&&f| f).count(),
        "normalized weekly series"
    );

    Ok(WeeklySeries {
        dates,
        values,
        filled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::Weekday;

    fn is_week_start(date: NaiveDate) -> bool {
        date.weekday() == Weekday::Mon
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn weekly_points(start: NaiveDate, values: &[f64]) -> Vec<ObservedPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| ObservedPoint::new(start + Duration::weeks(i as i64), v))
            .collect()
    }

    #[test]
    fn week_helpers() {
        assert_eq!(week_start(date(2024, 1, 3)), date(2024, 1, 1));
        assert_eq!(week_start(date(2024, 1, 7)), date(2024, 1, 1));
        assert_eq!(week_of_year(date(2024, 1, 1)), 1);
        // 2020-12-28 is in ISO week 53 of 2020
        assert_eq!(week_of_year(date(2020, 12, 28)), 52);
        assert_eq!(iso_year(date(2021, 1, 1)), 2020);
        assert!(is_week_start(date(2024, 1, 1)));
    }

    #[test]
    fn regular_input_passes_through() {
        let values: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let series = normalize_weekly(&weekly_points(date(2024, 1, 1), &values)).unwrap();
        assert_eq!(series.len(), 12);
        assert_eq!(series.values(), values.as_slice());
        assert_eq!(series.filled_count(), 0);
        assert!(series.dates().iter().all(|&d| is_week_start(d)));
        assert!(series
            .dates()
            .windows(2)
            .all(|w| (w[1] - w[0]).num_days() == 7));
    }

    #[test]
    fn same_week_values_are_summed() {
        let mut points = weekly_points(date(2024, 1, 1), &[10.0; 10]);
        // Wednesday of the first week
        points.push(ObservedPoint::new(date(2024, 1, 3), 5.0));
        let series = normalize_weekly(&points).unwrap();
        assert_eq!(series.len(), 10);
        assert_relative_eq!(series.values()[0], 15.0);
    }

    #[test]
    fn gaps_are_forward_filled() {
        let values: Vec<f64> = (1..=13).map(f64::from).collect();
        let mut points = weekly_points(date(2024, 1, 1), &values);
        points.remove(3);
        points.remove(3);
        let series = normalize_weekly(&points).unwrap();
        assert_eq!(series.len(), 13);
        assert_eq!(&series.values()[2..6], &[3.0, 3.0, 3.0, 6.0]);
        assert_eq!(series.filled_count(), 2);
        assert!(series.filled()[3] && series.filled()[4]);
    }

    #[test]
    fn unordered_input_is_sorted() {
        let mut points = weekly_points(date(2024, 1, 1), &(0..10).map(f64::from).collect::<Vec<_>>());
        points.reverse();
        let series = normalize_weekly(&points).unwrap();
        assert_eq!(series.values()[0], 0.0);
        assert_eq!(series.values()[9], 9.0);
    }

    #[test]
    fn too_few_weeks_fail() {
        let points = weekly_points(date(2024, 1, 1), &[1.0; 9]);
        assert!(matches!(
            normalize_weekly(&points),
            Err(SeasonalityError::InsufficientData { needed: 10, got: 9 })
        ));

        // Thirty daily points span only five weeks
        let daily: Vec<ObservedPoint> = (0..30)
            .map(|i| ObservedPoint::new(date(2024, 1, 1) + Duration::days(i), 1.0))
            .collect();
        assert!(matches!(
            normalize_weekly(&daily),
            Err(SeasonalityError::InsufficientData { got: 5, .. })
        ));
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let mut points = weekly_points(date(2024, 1, 1), &[1.0; 12]);
        points[4].value = f64::NAN;
        assert!(matches!(
            normalize_weekly(&points),
            Err(SeasonalityError::InvalidInput(_))
        ));
    }

    #[test]
    fn negative_value_is_rejected() {
        let mut points = weekly_points(date(2024, 1, 1), &[1.0; 12]);
        points[3].value = -5_000.0;
        match normalize_weekly(&points) {
            Err(SeasonalityError::InvalidInput(msg)) => assert!(msg.contains("negative")),
            other => panic!("expected invalid input, got {:?}", other),
        }
    }

    #[test]
    fn negative_grid_value_is_rejected() {
        let mut values = vec![5.0; 12];
        values[7] = -1.0;
        assert!(matches!(
            WeeklySeries::from_values(date(2024, 1, 1), values),
            Err(SeasonalityError::InvalidInput(_))
        ));
    }

    #[test]
    fn zero_value_is_accepted() {
        let mut points = weekly_points(date(2024, 1, 1), &[1.0; 12]);
        points[3].value = 0.0;
        let series = normalize_weekly(&points).unwrap();
        assert_eq!(series.values()[3], 0.0);
    }

    #[test]
    fn log_eligibility_flag() {
        let series = WeeklySeries::from_values(date(2024, 1, 1), vec![5.0; 12]).unwrap();
        assert!(series.log_eligible());
        let mut values = vec![5.0; 12];
        values[3] = 0.0;
        let series = WeeklySeries::from_values(date(2024, 1, 1), values).unwrap();
        assert!(!series.log_eligible());
    }

    #[test]
    fn years_are_distinct_and_sorted() {
        let series = WeeklySeries::from_values(date(2021, 1, 4), vec![1.0; 110]).unwrap();
        assert_eq!(series.years(), vec![2021, 2022, 2023]);
    }
}
