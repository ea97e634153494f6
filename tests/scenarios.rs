//! End-to-end scenarios on synthetic weekly revenue.

use chrono::{Duration, NaiveDate};
use revenue_seasonality::config::PipelineConfig;
use revenue_seasonality::core::{iso_year, ObservedPoint, WeeklySeries};
use revenue_seasonality::diagnostics::ReportValue;
use revenue_seasonality::error::SeasonalityError;
use revenue_seasonality::pipeline::{analyze_series, run_pipeline};
use std::f64::consts::PI;

fn start() -> NaiveDate {
    // Monday of ISO week 1
    NaiveDate::from_ymd_opt(2021, 1, 4).unwrap()
}

fn to_points(values: &[f64]) -> Vec<ObservedPoint> {
    values
        .iter()
        .enumerate()
        .map(|(t, &v)| ObservedPoint::new(start() + Duration::weeks(t as i64), v))
        .collect()
}

fn mean_of(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    collected.iter().sum::<f64>() / collected.len() as f64
}

#[test]
fn growing_sine_separates_trend_from_season() {
    let values: Vec<f64> = (0..110)
        .map(|t| 40_000.0 + 178.0 * t as f64 + 8_000.0 * (2.0 * PI * t as f64 / 52.0).sin())
        .collect();
    let output = run_pipeline(&to_points(&values), &PipelineConfig::default()).unwrap();

    assert!(output.diagnostics.seasonal_strength.unwrap() > 0.5);
    assert!(output.decomposition.max_reconstruction_error() < 1e-6);

    // Sine maximum at t = 13 is ISO week 14, minimum at t = 39 is week 40
    let peaks = &output.peaks.detrended_peaks;
    let troughs = &output.peaks.detrended_troughs;
    assert!(!peaks.occurrences.is_empty() && !troughs.occurrences.is_empty());
    let peak_week = mean_of(peaks.occurrences.iter().map(|o| o.week_of_year as f64));
    let trough_week = mean_of(troughs.occurrences.iter().map(|o| o.week_of_year as f64));
    assert!((peak_week - 14.0).abs() <= 2.0, "peak week {}", peak_week);
    assert!((trough_week - 40.0).abs() <= 2.0, "trough week {}", trough_week);
    assert!(peaks.consistent_weeks().all(|w| (8..=20).contains(&w.week_of_year)));

    // Growth pushes raw peaks later in the series
    let raw_day = output.peaks.raw_peaks.mean_occurrence_day().unwrap();
    let detrended_day = peaks.mean_occurrence_day().unwrap();
    assert!(raw_day > detrended_day);

    assert!(output
        .calendar
        .iter()
        .all(|e| e.recommended_prep_start_date == e.approximate_date - Duration::days(21)));
}

#[test]
fn flat_series_has_no_structure() {
    let output = run_pipeline(&to_points(&[50_000.0; 60]), &PipelineConfig::default()).unwrap();

    for set in [
        &output.peaks.raw_peaks,
        &output.peaks.raw_troughs,
        &output.peaks.detrended_peaks,
        &output.peaks.detrended_troughs,
    ] {
        assert!(set.occurrences.is_empty());
        assert!(set.weeks.is_empty());
    }
    assert!(output.diagnostics.seasonal_strength.is_none());
    assert_eq!(output.anomalies.flagged_count(), 0);
    assert!(output.calendar.is_empty());
    assert!(output.diagnostics.degenerate_series);

    let report = output.diagnostics.to_report();
    assert_eq!(report["seasonal_strength"], ReportValue::Undefined);
    assert_eq!(report["anomaly_count"], ReportValue::Number(0.0));
}

#[test]
fn single_spike_is_the_only_anomaly() {
    let mut values: Vec<f64> = (0..156)
        .map(|t| 2_000.0 + 5.0 * t as f64 + 300.0 * (2.0 * PI * t as f64 / 52.0).sin())
        .collect();
    values[80] *= 10.0;
    let output = run_pipeline(&to_points(&values), &PipelineConfig::default()).unwrap();

    let flagged: Vec<usize> = output.anomalies.flagged().map(|a| a.index).collect();
    assert_eq!(flagged, vec![80]);
    assert!(!output.decomposition.used_fallback());
    assert!(!output.forecast.used_fallback());

    // Robust fitting keeps the spike out of the seasonal cycle
    let phase = 80 % 52;
    assert!(output.decomposition.cycle[phase].abs() < 400.0);
}

#[test]
fn fewer_than_ten_weeks_is_rejected() {
    // Three observations in each of nine weeks
    let points: Vec<ObservedPoint> = (0..27)
        .map(|i| ObservedPoint::new(start() + Duration::days((i / 3) * 7 + i % 3), 100.0))
        .collect();
    match run_pipeline(&points, &PipelineConfig::default()) {
        Err(SeasonalityError::InsufficientData { needed, got }) => {
            assert_eq!(needed, 10);
            assert_eq!(got, 9);
        }
        other => panic!("expected insufficient data, got {:?}", other.map(|o| o.series.len())),
    }
}

#[test]
fn one_year_has_no_consistent_weeks() {
    let values: Vec<f64> = (0..52)
        .map(|t| 10_000.0 + 3_000.0 * (2.0 * PI * t as f64 / 52.0).sin())
        .collect();
    let output = run_pipeline(&to_points(&values), &PipelineConfig::default()).unwrap();

    assert_eq!(output.series.years(), vec![iso_year(start())]);
    assert!(!output.peaks.detrended_peaks.weeks.is_empty());
    for set in [
        &output.peaks.raw_peaks,
        &output.peaks.raw_troughs,
        &output.peaks.detrended_peaks,
        &output.peaks.detrended_troughs,
    ] {
        assert!(set.weeks.iter().all(|w| !w.is_consistent && w.years_observed_as_peak == 1));
    }
    assert!(output.calendar.is_empty());
}

#[test]
fn gaps_are_filled_and_reported() {
    let mut points = to_points(
        &(0..120)
            .map(|t| 7_000.0 + 900.0 * (2.0 * PI * t as f64 / 52.0).cos())
            .collect::<Vec<_>>(),
    );
    points.remove(40);
    points.remove(70);
    let output = run_pipeline(&points, &PipelineConfig::default()).unwrap();
    assert_eq!(output.series.len(), 120);
    assert_eq!(output.series.filled_count(), 2);
    assert_eq!(output.diagnostics.to_report()["filled_weeks"], ReportValue::Number(2.0));
}

#[test]
fn configuration_from_json_drives_the_run() {
    let config: PipelineConfig =
        serde_json::from_str(r#"{"forecastHorizon": 26, "confidenceLevel": 0.95, "compareSeasonalArima": false}"#)
            .unwrap();
    let values: Vec<f64> = (0..110)
        .map(|t| 5_000.0 + 10.0 * t as f64 + 800.0 * (2.0 * PI * t as f64 / 52.0).sin() + ((t * 31) % 17) as f64 * 20.0)
        .collect();
    let series = WeeklySeries::from_values(start(), values).unwrap();
    let output = analyze_series(series, &config).unwrap();
    assert_eq!(output.forecast.horizon, 26);
    assert_eq!(output.forecast.confidence_level, 0.95);
    assert!(output.forecast.seasonal_arima.is_none());

    let bad: PipelineConfig = serde_json::from_str(r#"{"confidenceLevel": 1.5}"#).unwrap();
    assert!(matches!(
        run_pipeline(&[], &bad),
        Err(SeasonalityError::Configuration(_))
    ));
}
