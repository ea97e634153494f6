//! Ordinary Least Squares (OLS) regression utilities.
//!
//! Used for the linear trend fits of the decomposition and forecast stages and
//! for the augmented Dickey-Fuller regression.

use crate::error::{Result, SeasonalityError};

/// Straight-line fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    /// Intercept term.
    pub intercept: f64,
    /// Slope term.
    pub slope: f64,
}

impl LinearFit {
    /// Evaluate the line at `x`.
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a straight line through `(x, y)` pairs.
///
/// Returns an error when fewer than two points are given or all `x` coincide.
pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    let n = x.len();
    if n != y.len() {
        return Err(SeasonalityError::Computation(format!(
            "line fit needs paired samples, got {} x and {} y",
            n,
            y.len()
        )));
    }
    if n < 2 {
        return Err(SeasonalityError::InsufficientData { needed: 2, got: n });
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        sxx += (xi - mean_x) * (xi - mean_x);
        sxy += (xi - mean_x) * (yi - mean_y);
    }

    if sxx <= 0.0 {
        return Err(SeasonalityError::Computation(
            "line fit needs at least two distinct x values".into(),
        ));
    }

    let slope = sxy / sxx;
    Ok(LinearFit {
        intercept: mean_y - slope * mean_x,
        slope,
    })
}

/// Fit a straight line against the positions `offset, offset + 1, ...`.
pub fn fit_line_indexed(y: &[f64], offset: usize) -> Result<LinearFit> {
    let x: Vec<f64> = (0..y.len()).map(|i| (offset + i) as f64).collect();
    fit_line(&x, y)
}

/// Multiple regression result `y = X @ coefficients`.
#[derive(Debug, Clone)]
pub struct OlsResult {
    /// Coefficients, one per design column.
    pub coefficients: Vec<f64>,
    /// Standard errors of the coefficients.
    pub std_errors: Vec<f64>,
    /// Residual sum of squares.
    pub rss: f64,
    /// Number of observations.
    pub n_obs: usize,
}

/// Fit `y = X @ beta` where `columns` holds the design matrix column-wise.
///
/// The caller adds an explicit column of ones when an intercept is wanted.
pub fn ols_fit(y: &[f64], columns: &[Vec<f64>]) -> Result<OlsResult> {
    let n = y.len();
    let k = columns.len();

    if k == 0 {
        return Err(SeasonalityError::Computation(
            "regression needs at least one column".into(),
        ));
    }
    if n <= k {
        return Err(SeasonalityError::InsufficientData {
            needed: k + 1,
            got: n,
        });
    }
    if let Some(col) = columns.iter().find(|c| c.len() != n) {
        return Err(SeasonalityError::Computation(format!(
            "design column has {} rows, expected {}",
            col.len(),
            n
        )));
    }

    // Normal equations X'X @ beta = X'y
    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for obs in 0..n {
        for i in 0..k {
            let xi = columns[i][obs];
            xty[i] += xi * y[obs];
            for j in 0..=i {
                xtx[i][j] += xi * columns[j][obs];
            }
        }
    }
    for i in 0..k {
        for j in (i + 1)..k {
            xtx[i][j] = xtx[j][i];
        }
    }

    let chol = cholesky(&xtx).ok_or_else(|| {
        SeasonalityError::Computation("regression matrix is not positive definite".into())
    })?;
    let beta = cholesky_solve(&chol, &xty);

    let rss: f64 = (0..n)
        .map(|obs| {
            let fitted: f64 = (0..k).map(|i| beta[i] * columns[i][obs]).sum();
            (y[obs] - fitted).powi(2)
        })
        .sum();
    let sigma_sq = rss / (n - k) as f64;

    // Diagonal of (X'X)^-1 via unit-vector solves
    let std_errors = (0..k)
        .map(|j| {
            let mut unit = vec![0.0; k];
            unit[j] = 1.0;
            let col = cholesky_solve(&chol, &unit);
            (sigma_sq * col[j]).max(0.0).sqrt()
        })
        .collect();

    Ok(OlsResult {
        coefficients: beta,
        std_errors,
        rss,
        n_obs: n,
    })
}

/// Cholesky factor `L` with `A = L @ L'`, or `None` if `A` is not positive definite.
fn cholesky(a: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut l = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }

            if i == j {
                if sum <= 1e-12 * a[i][i].abs() || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    Some(l)
}

/// Solve `L @ L' @ x = b` by forward then backward substitution.
fn cholesky_solve(l: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = b.len();

    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i][j] * y[j];
        }
        y[i] = sum / l[i][i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j][i] * x[j];
        }
        x[i] = sum / l[i][i];
    }

    x
}
