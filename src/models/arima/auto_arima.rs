//! Automatic ARIMA order selection.

use std::time::{Duration, Instant};

use crate::error::{Result, SeasonalityError};
use crate::models::arima::diff::suggest_differencing;
use crate::models::arima::model::{Arima, ArimaForecast, ArimaSpec};

/// Configuration for AutoArima.
#[derive(Debug, Clone)]
pub struct AutoArimaConfig {
    /// Maximum AR order to consider.
    pub max_p: usize,
    /// Maximum MA order to consider.
    pub max_q: usize,
    /// Maximum differencing order.
    pub max_d: usize,
    /// Stop trying new candidates once this much time has passed.
    pub time_budget: Option<Duration>,
}

impl Default for AutoArimaConfig {
    fn default() -> Self {
        Self {
            max_p: 3,
            max_q: 3,
            max_d: 1,
            time_budget: None,
        }
    }
}

impl AutoArimaConfig {
    /// Set maximum orders.
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    pub fn with_time_budget(mut self, budget: Option<Duration>) -> Self {
        self.time_budget = budget;
        self
    }
}

/// Automatic ARIMA model selection by AIC.
///
/// Every order with `p <= max_p`, `q <= max_q` and a differencing order near
/// the suggested one is fitted; the lowest AIC wins. Candidates are tried
/// from simplest to most complex, so ties and an exhausted time budget both
/// favour smaller models. ARIMA(0,0,0) is always among the candidates.
#[derive(Debug, Clone)]
pub struct AutoArima {
    config: AutoArimaConfig,
    selected: Option<Arima>,
    /// Fitted candidates and their AIC.
    model_scores: Vec<(ArimaSpec, f64)>,
    budget_exhausted: bool,
}

impl AutoArima {
    pub fn new() -> Self {
        Self::with_config(AutoArimaConfig::default())
    }

    pub fn with_config(config: AutoArimaConfig) -> Self {
        Self {
            config,
            selected: None,
            model_scores: Vec::new(),
            budget_exhausted: false,
        }
    }

    pub fn selected_spec(&self) -> Option<ArimaSpec> {
        self.selected.as_ref().map(Arima::spec)
    }

    pub fn selected_model(&self) -> Option<&Arima> {
        self.selected.as_ref()
    }

    pub fn model_scores(&self) -> &[(ArimaSpec, f64)] {
        &self.model_scores
    }

    /// True when the time budget stopped the search early.
    pub fn budget_exhausted(&self) -> bool {
        self.budget_exhausted
    }

    pub fn aic(&self) -> Option<f64> {
        self.selected.as_ref().and_then(Arima::aic)
    }

    /// Orders to try, simplest first.
    fn candidates(&self, series: &[f64]) -> Vec<ArimaSpec> {
        let max_d = self.config.max_d;
        let suggested = suggest_differencing(series, max_d);

        let mut d_values = vec![0, suggested.saturating_sub(1), suggested, (suggested + 1).min(max_d)];
        d_values.sort_unstable();
        d_values.dedup();

        let mut specs: Vec<ArimaSpec> = d_values
            .iter()
            .flat_map(|&d| {
                (0..=self.config.max_p)
                    .flat_map(move |p| (0..=self.config.max_q).map(move |q| ArimaSpec::new(p, d, q)))
            })
            .filter(|spec| spec.min_length() <= series.len())
            .collect();
        specs.sort_by_key(|s| (s.p + s.q, s.d, s.p, s.q));
        specs
    }

    /// Search the candidate orders and keep the best model.
    ///
    /// # Errors
    /// `InsufficientData` when even ARIMA(0,0,0) cannot be fitted,
    /// `ModelFit` when no candidate produced a usable fit.
    pub fn fit(&mut self, series: &[f64]) -> Result<()> {
        let min_len = ArimaSpec::new(0, 0, 0).min_length();
        if series.len() < min_len {
            return Err(SeasonalityError::InsufficientData {
                needed: min_len,
                got: series.len(),
            });
        }

        self.selected = None;
        self.model_scores.clear();
        self.budget_exhausted = false;

        let started = Instant::now();
        let mut best: Option<(Arima, f64)> = None;

        for spec in self.candidates(series) {
            if let Some(budget) = self.config.time_budget {
                if !self.model_scores.is_empty() && started.elapsed() > budget {
                    self.budget_exhausted = true;
                    tracing::debug!(tried = self.model_scores.len(), "ARIMA search hit its time budget");
                    break;
                }
            }

            let mut model = Arima::from_spec(spec);
            match model.fit(series) {
                Ok(()) => {
                    let Some(aic) = model.aic() else { continue };
                    self.model_scores.push((spec, aic));
                    if best.as_ref().map_or(true, |(_, b)| aic < *b) {
                        best = Some((model, aic));
                    }
                }
                Err(err) => {
                    tracing::trace!(p = spec.p, d = spec.d, q = spec.q, error = %err, "ARIMA candidate rejected");
                }
            }
        }

        match best {
            Some((model, aic)) => {
                let spec = model.spec();
                tracing::debug!(p = spec.p, d = spec.d, q = spec.q, aic, "selected ARIMA order");
                self.selected = Some(model);
                Ok(())
            }
            None => Err(SeasonalityError::ModelFit(
                "no ARIMA candidate could be fitted".into(),
            )),
        }
    }

    /// Forecast with the selected model.
    pub fn predict(&self, horizon: usize) -> Result<ArimaForecast> {
        match &self.selected {
            Some(model) => model.predict(horizon),
            None => Err(SeasonalityError::ModelFit(
                "AutoArima must be fitted before predicting".into(),
            )),
        }
    }
}

impl Default for AutoArima {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn selects_an_order_within_limits() {
        let mut rng = StdRng::seed_from_u64(31);
        let mut values = vec![0.0];
        for i in 1..200 {
            values.push(0.8 * values[i - 1] + rng.gen_range(-1.0..1.0));
        }
        let mut auto = AutoArima::new();
        auto.fit(&values).unwrap();
        let spec = auto.selected_spec().unwrap();
        assert!(spec.p <= 3 && spec.q <= 3 && spec.d <= 1);
        assert!(spec.p + spec.q > 0 || spec.d > 0);
        assert!(auto.aic().unwrap().is_finite());
        assert!(!auto.budget_exhausted());
    }

    #[test]
    fn selected_model_has_lowest_score() {
        let values = noise(120, 32);
        let mut auto = AutoArima::new();
        auto.fit(&values).unwrap();
        let best = auto.aic().unwrap();
        assert!(auto.model_scores().iter().all(|(_, aic)| *aic >= best));
        assert!(auto
            .model_scores()
            .iter()
            .any(|(spec, _)| *spec == ArimaSpec::new(0, 0, 0)));
    }

    #[test]
    fn zero_budget_keeps_simplest_candidate() {
        let values = noise(80, 33);
        let config = AutoArimaConfig::default().with_time_budget(Some(Duration::ZERO));
        let mut auto = AutoArima::with_config(config);
        auto.fit(&values).unwrap();
        assert!(auto.budget_exhausted());
        assert_eq!(auto.model_scores().len(), 1);
        assert_eq!(auto.selected_spec().unwrap().p + auto.selected_spec().unwrap().q, 0);
    }

    #[test]
    fn forecast_has_requested_horizon() {
        let mut auto = AutoArima::new();
        auto.fit(&noise(100, 34)).unwrap();
        let forecast = auto.predict(12).unwrap();
        assert_eq!(forecast.mean.len(), 12);
        assert!(forecast.std_errors.iter().all(|se| se.is_finite() && *se > 0.0));
    }

    #[test]
    fn constant_series_cannot_be_fitted() {
        let mut auto = AutoArima::new();
        assert!(matches!(auto.fit(&[2.0; 50]), Err(SeasonalityError::ModelFit(_))));
        assert!(matches!(
            auto.fit(&[1.0, 2.0]),
            Err(SeasonalityError::InsufficientData { .. })
        ));
        assert!(auto.predict(3).is_err());
    }
}
