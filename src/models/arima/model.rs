//! ARIMA (Autoregressive Integrated Moving Average) model.

use crate::error::{Result, SeasonalityError};
use crate::models::arima::diff::{difference, integrate};
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};

/// ARIMA model specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArimaSpec {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
}

impl ArimaSpec {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Total number of parameters.
    pub fn num_params(&self) -> usize {
        self.p + self.q + 1 // AR + MA + intercept
    }

    /// Shortest series this order can be fitted to.
    pub fn min_length(&self) -> usize {
        self.d + self.p.max(self.q) + self.num_params() + 2
    }
}

/// Point forecast and standard errors of an ARIMA model.
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaForecast {
    pub mean: Vec<f64>,
    /// Standard error of each step, growing with the horizon.
    pub std_errors: Vec<f64>,
}

/// ARIMA forecasting model fitted by conditional sum of squares.
///
/// ARIMA(p, d, q) combines:
/// - AR(p): Autoregressive component
/// - I(d): Differencing for stationarity
/// - MA(q): Moving average component
#[derive(Debug, Clone)]
pub struct Arima {
    spec: ArimaSpec,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    /// Mean of the differenced series.
    intercept: f64,
    original: Option<Vec<f64>>,
    differenced: Option<Vec<f64>>,
    /// Innovations on the differenced scale.
    residuals: Option<Vec<f64>>,
    residual_variance: Option<f64>,
    aic: Option<f64>,
    bic: Option<f64>,
    converged: bool,
}

impl Arima {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self::from_spec(ArimaSpec::new(p, d, q))
    }

    pub fn from_spec(spec: ArimaSpec) -> Self {
        Self {
            spec,
            ar_coefficients: vec![],
            ma_coefficients: vec![],
            intercept: 0.0,
            original: None,
            differenced: None,
            residuals: None,
            residual_variance: None,
            aic: None,
            bic: None,
            converged: false,
        }
    }

    pub fn spec(&self) -> ArimaSpec {
        self.spec
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn aic(&self) -> Option<f64> {
        self.aic
    }

    pub fn bic(&self) -> Option<f64> {
        self.bic
    }

    pub fn residual_variance(&self) -> Option<f64> {
        self.residual_variance
    }

    pub fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    /// Fit the model to `series`.
    ///
    /// # Errors
    /// `InsufficientData` for short series, `InvalidInput` for non-finite
    /// values, `ModelFit` when the optimizer does not converge or the
    /// information criterion is not finite.
    pub fn fit(&mut self, series: &[f64]) -> Result<()> {
        let min_len = self.spec.min_length();
        if series.len() < min_len {
            return Err(SeasonalityError::InsufficientData {
                needed: min_len,
                got: series.len(),
            });
        }
        if series.iter().any(|v| !v.is_finite()) {
            return Err(SeasonalityError::InvalidInput(
                "ARIMA input contains non-finite values".into(),
            ));
        }

        let diff_series = difference(series, self.spec.d);
        self.estimate_parameters(&diff_series);
        if !self.converged {
            return Err(SeasonalityError::ModelFit(format!(
                "ARIMA({},{},{}) optimizer did not converge",
                self.spec.p, self.spec.d, self.spec.q
            )));
        }

        self.calculate_fitted(&diff_series);
        match self.aic {
            Some(aic) if aic.is_finite() => {}
            _ => {
                return Err(SeasonalityError::ModelFit(format!(
                    "ARIMA({},{},{}) has no finite AIC",
                    self.spec.p, self.spec.d, self.spec.q
                )))
            }
        }

        self.original = Some(series.to_vec());
        self.differenced = Some(diff_series);
        Ok(())
    }

    /// Calculate the conditional sum of squares for given parameters.
    fn calculate_css(diff_series: &[f64], p: usize, q: usize, ar: &[f64], ma: &[f64], intercept: f64) -> f64 {
        let n = diff_series.len();
        let start = p.max(q);

        if n <= start {
            return f64::MAX;
        }

        let mut residuals = vec![0.0; n];
        let mut css = 0.0;

        for t in start..n {
            let mut pred = intercept;
            for i in 0..p {
                pred += ar[i] * (diff_series[t - 1 - i] - intercept);
            }
            for i in 0..q {
                pred += ma[i] * residuals[t - 1 - i];
            }

            let error = diff_series[t] - pred;
            residuals[t] = error;
            css += error * error;
        }

        css
    }

    /// Estimate parameters using conditional least squares.
    fn estimate_parameters(&mut self, diff_series: &[f64]) {
        let p = self.spec.p;
        let q = self.spec.q;
        let mean = diff_series.iter().sum::<f64>() / diff_series.len() as f64;

        if p == 0 && q == 0 {
            self.intercept = mean;
            self.ar_coefficients = vec![];
            self.ma_coefficients = vec![];
            self.converged = true;
            return;
        }

        let n_params = p + q + 1;
        let mut initial = vec![0.0; n_params];
        initial[0] = mean;
        for i in 0..p {
            initial[1 + i] = 0.1 / (i + 1) as f64;
        }
        for i in 0..q {
            initial[1 + p + i] = 0.1 / (i + 1) as f64;
        }

        // Coefficients bounded for stationarity/invertibility
        let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY)];
        bounds.extend(std::iter::repeat((-0.99, 0.99)).take(p + q));

        let result = nelder_mead(
            |params| {
                Self::calculate_css(diff_series, p, q, &params[1..1 + p], &params[1 + p..], params[0])
            },
            &initial,
            Some(&bounds),
            NelderMeadConfig {
                tolerance: 1e-8,
                ..NelderMeadConfig::default()
            },
        );

        self.converged = result.converged && result.optimal_value.is_finite();
        self.intercept = result.optimal_point[0];
        self.ar_coefficients = result.optimal_point[1..1 + p].to_vec();
        self.ma_coefficients = result.optimal_point[1 + p..].to_vec();
    }

    /// Calculate residuals, variance and information criteria.
    fn calculate_fitted(&mut self, diff_series: &[f64]) {
        let n = diff_series.len();
        let p = self.spec.p;
        let q = self.spec.q;
        let start = p.max(q);

        let mut residuals = vec![0.0; n];
        for t in start..n {
            let mut pred = self.intercept;
            for i in 0..p {
                pred += self.ar_coefficients[i] * (diff_series[t - 1 - i] - self.intercept);
            }
            for i in 0..q {
                pred += self.ma_coefficients[i] * residuals[t - 1 - i];
            }
            residuals[t] = diff_series[t] - pred;
        }

        let valid = &residuals[start..];
        if !valid.is_empty() {
            let variance = valid.iter().map(|r| r * r).sum::<f64>() / valid.len() as f64;
            self.residual_variance = Some(variance);

            let n_eff = valid.len() as f64;
            let k = self.spec.num_params() as f64;
            let ll = -0.5 * n_eff * (1.0 + variance.ln() + (2.0 * std::f64::consts::PI).ln());

            self.aic = Some(-2.0 * ll + 2.0 * k);
            self.bic = Some(-2.0 * ll + k * n_eff.ln());
        }

        self.residuals = Some(residuals);
    }

    /// Forecast `horizon` steps ahead with standard errors.
    pub fn predict(&self, horizon: usize) -> Result<ArimaForecast> {
        let (original, diff_series, residuals) =
            match (&self.original, &self.differenced, &self.residuals) {
                (Some(o), Some(d), Some(r)) => (o, d, r),
                _ => {
                    return Err(SeasonalityError::ModelFit(
                        "ARIMA model must be fitted before predicting".into(),
                    ))
                }
            };

        if horizon == 0 {
            return Ok(ArimaForecast {
                mean: vec![],
                std_errors: vec![],
            });
        }

        let p = self.spec.p;
        let q = self.spec.q;
        let mut extended_diff = diff_series.clone();
        let mut extended_residuals = residuals.clone();

        for _ in 0..horizon {
            let t = extended_diff.len();
            let mut pred = self.intercept;
            for i in 0..p.min(t) {
                pred += self.ar_coefficients[i] * (extended_diff[t - 1 - i] - self.intercept);
            }
            // Future innovations are zero
            for i in 0..q.min(t) {
                pred += self.ma_coefficients[i] * extended_residuals[t - 1 - i];
            }
            extended_diff.push(pred);
            extended_residuals.push(0.0);
        }

        let forecast_diff = &extended_diff[diff_series.len()..];
        let mean = integrate(forecast_diff, original, self.spec.d);

        let sigma = self.residual_variance.unwrap_or(0.0).max(0.0).sqrt();
        let mut cumulative = 0.0;
        let std_errors = self
            .psi_weights(horizon)
            .iter()
            .map(|psi| {
                cumulative += psi * psi;
                sigma * cumulative.sqrt()
            })
            .collect();

        Ok(ArimaForecast { mean, std_errors })
    }

    /// First `count` weights of the infinite MA representation on the
    /// undifferenced scale.
    pub fn psi_weights(&self, count: usize) -> Vec<f64> {
        // AR polynomial times (1 - B)^d
        let mut phi: Vec<f64> = vec![1.0];
        phi.extend(self.ar_coefficients.iter().map(|a| -a));
        for _ in 0..self.spec.d {
            let mut next = vec![0.0; phi.len() + 1];
            for (i, &c) in phi.iter().enumerate() {
                next[i] += c;
                next[i + 1] -= c;
            }
            phi = next;
        }
        let ar_full: Vec<f64> = phi.iter().skip(1).map(|c| -c).collect();

        let mut psi = Vec::with_capacity(count);
        for j in 0..count {
            if j == 0 {
                psi.push(1.0);
                continue;
            }
            let mut value = if j <= self.ma_coefficients.len() {
                self.ma_coefficients[j - 1]
            } else {
                0.0
            };
            for (i, &a) in ar_full.iter().enumerate().take(j) {
                value += a * psi[j - 1 - i];
            }
            psi.push(value);
        }
        psi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn ar1_series(phi: f64, n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut values = vec![0.0];
        for i in 1..n {
            values.push(phi * values[i - 1] + rng.gen_range(-1.0..1.0));
        }
        values
    }

    #[test]
    fn ar1_coefficient_is_recovered() {
        let values = ar1_series(0.7, 300, 21);
        let mut model = Arima::new(1, 0, 0);
        model.fit(&values).unwrap();
        assert_relative_eq!(model.ar_coefficients()[0], 0.7, epsilon = 0.12);
        assert!(model.aic().unwrap().is_finite());
    }

    #[test]
    fn white_noise_model_is_the_mean() {
        let values: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { 3.0 }).collect();
        let mut model = Arima::new(0, 0, 0);
        model.fit(&values).unwrap();
        assert_relative_eq!(model.intercept(), 2.0, epsilon = 1e-12);
        let forecast = model.predict(3).unwrap();
        assert!(forecast.mean.iter().all(|&m| (m - 2.0).abs() < 1e-12));
        // Constant standard error for white noise
        assert_relative_eq!(forecast.std_errors[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(forecast.std_errors[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ar1_forecast_decays_to_mean() {
        let values = ar1_series(0.6, 200, 22);
        let mut model = Arima::new(1, 0, 0);
        model.fit(&values).unwrap();
        let forecast = model.predict(40).unwrap();
        assert_relative_eq!(forecast.mean[39], model.intercept(), epsilon = 1e-3);
        assert!(forecast
            .std_errors
            .windows(2)
            .all(|w| w[1] >= w[0] - 1e-12));
    }

    #[test]
    fn random_walk_standard_errors_grow_like_sqrt_h() {
        let mut model = Arima::new(0, 1, 0);
        let mut rng = StdRng::seed_from_u64(23);
        let mut values = vec![0.0];
        for i in 1..120 {
            values.push(values[i - 1] + rng.gen_range(-1.0..1.0));
        }
        model.fit(&values).unwrap();
        let psi = model.psi_weights(5);
        assert!(psi.iter().all(|&w| (w - 1.0).abs() < 1e-12));
        let forecast = model.predict(4).unwrap();
        assert_relative_eq!(
            forecast.std_errors[3],
            2.0 * forecast.std_errors[0],
            epsilon = 1e-9
        );
    }

    #[test]
    fn psi_weights_for_arma11() {
        let mut model = Arima::new(1, 0, 1);
        model.ar_coefficients = vec![0.5];
        model.ma_coefficients = vec![0.3];
        let psi = model.psi_weights(4);
        assert_relative_eq!(psi[0], 1.0);
        assert_relative_eq!(psi[1], 0.8, epsilon = 1e-12);
        assert_relative_eq!(psi[2], 0.4, epsilon = 1e-12);
        assert_relative_eq!(psi[3], 0.2, epsilon = 1e-12);
    }

    #[test]
    fn short_or_unfitted_model_errors() {
        let mut model = Arima::new(2, 1, 2);
        assert!(matches!(
            model.fit(&[1.0, 2.0, 3.0]),
            Err(SeasonalityError::InsufficientData { .. })
        ));
        assert!(matches!(model.predict(3), Err(SeasonalityError::ModelFit(_))));
    }

    #[test]
    fn constant_input_has_no_finite_aic() {
        let mut model = Arima::new(0, 0, 0);
        assert!(matches!(
            model.fit(&[5.0; 30]),
            Err(SeasonalityError::ModelFit(_))
        ));
    }
}
