//! FFT periodogram used to confirm the assumed seasonal period.

use rustfft::{num_complex::Complex64, FftPlanner};
use serde::Serialize;

/// Compute the FFT of a real-valued signal.
///
/// Only the non-negative frequencies `0..=N/2` are returned.
pub fn fft_real(signal: &[f64]) -> Vec<Complex64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    buffer.truncate(n / 2 + 1);
    buffer
}

/// Periodogram of the demeaned signal as `(period, power)` pairs.
///
/// Period is `N / k` in samples for frequency index `k >= 1`; power is
/// `|X[k]|^2 / N`. Pairs are ordered by decreasing period.
pub fn periodogram(signal: &[f64]) -> Vec<(f64, f64)> {
    let n = signal.len();
    if n < 4 {
        return Vec::new();
    }

    let m = signal.iter().sum::<f64>() / n as f64;
    let centered: Vec<f64> = signal.iter().map(|x| x - m).collect();
    let spectrum = fft_real(&centered);

    spectrum
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, c)| (n as f64 / k as f64, c.norm_sqr() / n as f64))
        .collect()
}

/// Strongest periodic component of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DominantPeriod {
    /// Period in samples (weeks).
    pub period: f64,
    pub power: f64,
    /// Fraction of total periodogram power at this period.
    pub power_share: f64,
}

/// Period with the largest power within `[min_period, max_period]`.
///
/// Returns `None` for short or constant signals.
///
/// # Example
/// ```
/// use revenue_seasonality::detection::dominant_period;
///
/// let signal: Vec<f64> = (0..104)
///     .map(|t| (2.0 * std::f64::consts::PI * t as f64 / 52.0).sin())
///     .collect();
/// let dominant = dominant_period(&signal, 2.0, 104.0).unwrap();
/// assert!((dominant.period - 52.0).abs() < 1e-9);
/// ```
pub fn dominant_period(signal: &[f64], min_period: f64, max_period: f64) -> Option<DominantPeriod> {
    let psd = periodogram(signal);
    let total: f64 = psd.iter().map(|(_, p)| p).sum();
    if !(total > 0.0) || !total.is_finite() {
        return None;
    }

    psd.iter()
        .filter(|(period, _)| *period >= min_period && *period <= max_period)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|&(period, power)| DominantPeriod {
            period,
            power,
            power_share: power / total,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn fft_of_constant_is_dc_only() {
        let spectrum = fft_real(&[2.0; 8]);
        assert_eq!(spectrum.len(), 5);
        assert_relative_eq!(spectrum[0].re, 16.0, epsilon = 1e-12);
        assert!(spectrum[1..].iter().all(|c| c.norm() < 1e-12));
    }

    #[test]
    fn periodogram_ignores_the_mean() {
        let signal: Vec<f64> = (0..64)
            .map(|t| 500.0 + (2.0 * PI * t as f64 / 8.0).cos())
            .collect();
        let psd = periodogram(&signal);
        assert_eq!(psd.len(), 32);
        let (period, _) = psd
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap();
        assert_relative_eq!(period, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn dominant_period_of_weekly_cycle() {
        let signal: Vec<f64> = (0..156)
            .map(|t| 3.0 * (2.0 * PI * t as f64 / 52.0).sin() + 0.5 * (2.0 * PI * t as f64 / 13.0).sin())
            .collect();
        let dominant = dominant_period(&signal, 2.0, 156.0).unwrap();
        assert_relative_eq!(dominant.period, 52.0, epsilon = 1e-9);
        assert!(dominant.power_share > 0.9);
    }

    #[test]
    fn constant_signal_has_no_dominant_period() {
        assert!(dominant_period(&[4.0; 60], 2.0, 60.0).is_none());
        assert!(dominant_period(&[1.0, 2.0], 2.0, 60.0).is_none());
    }
}
