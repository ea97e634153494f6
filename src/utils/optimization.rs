//! Derivative-free minimisation for model parameter estimation.

/// Result of Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// The best point found.
    pub optimal_point: Vec<f64>,
    /// The objective function value at the best point.
    pub optimal_value: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether the simplex met the tolerance before `max_iter`.
    pub converged: bool,
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations.
    pub max_iter: usize,
    /// Relative tolerance on the spread of objective values across the simplex.
    pub tolerance: f64,
    /// Reflection coefficient.
    pub alpha: f64,
    /// Expansion coefficient.
    pub gamma: f64,
    /// Contraction coefficient.
    pub rho: f64,
    /// Shrink coefficient.
    pub sigma: f64,
    /// Initial simplex step, relative to the starting coordinate when non-zero.
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 2000,
            tolerance: 1e-10,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
        }
    }
}

/// Minimise `objective` starting from `initial`, keeping each coordinate
/// inside the optional `(min, max)` bounds.
///
/// # Example
/// ```
/// use revenue_seasonality::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] - 3.0).powi(2),
///     &[0.0, 0.0],
///     None,
///     NelderMeadConfig::default(),
/// );
///
/// assert!(result.converged);
/// assert!((result.optimal_point[0] - 2.0).abs() < 0.01);
/// assert!((result.optimal_point[1] - 3.0).abs() < 0.01);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let dim = initial.len();
    if dim == 0 {
        return NelderMeadResult {
            optimal_point: vec![],
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
        };
    }

    let eval = |p: &[f64]| {
        let v = objective(p);
        if v.is_nan() {
            f64::INFINITY
        } else {
            v
        }
    };

    let start = clamp_to_bounds(initial.to_vec(), bounds);
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    let start_value = eval(&start);
    simplex.push((start.clone(), start_value));
    for i in 0..dim {
        let mut vertex = start.clone();
        vertex[i] += if vertex[i].abs() > 1e-10 {
            config.initial_step * vertex[i].abs()
        } else {
            config.initial_step
        };
        let vertex = clamp_to_bounds(vertex, bounds);
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[dim].1;
        if (worst - best).abs() <= config.tolerance * (best.abs() + 1e-300) || worst == best {
            converged = true;
            break;
        }

        let centroid = centroid_without_last(&simplex);
        let (worst_point, worst_value) = simplex[dim].clone();
        let second_worst = simplex[dim - 1].1;

        let reflected = clamp_to_bounds(
            affine(&centroid, &worst_point, -config.alpha),
            bounds,
        );
        let reflected_value = eval(&reflected);

        if reflected_value < best {
            let expanded = clamp_to_bounds(affine(&centroid, &reflected, config.gamma), bounds);
            let expanded_value = eval(&expanded);
            simplex[dim] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < second_worst {
            simplex[dim] = (reflected, reflected_value);
            continue;
        }

        let (toward, toward_value) = if reflected_value < worst_value {
            (reflected, reflected_value)
        } else {
            (worst_point, worst_value)
        };
        let contracted = clamp_to_bounds(affine(&centroid, &toward, config.rho), bounds);
        let contracted_value = eval(&contracted);
        if contracted_value < toward_value {
            simplex[dim] = (contracted, contracted_value);
            continue;
        }

        // Shrink everything towards the best vertex
        let anchor = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = clamp_to_bounds(affine(&anchor, &vertex.0, config.sigma), bounds);
            let value = eval(&shrunk);
            *vertex = (shrunk, value);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (optimal_point, optimal_value) = simplex.swap_remove(0);

    NelderMeadResult {
        optimal_point,
        optimal_value,
        iterations,
        converged,
    }
}

/// Centroid of every vertex except the last (worst) one.
fn centroid_without_last(simplex: &[(Vec<f64>, f64)]) -> Vec<f64> {
    let dim = simplex[0].0.len();
    let count = simplex.len() - 1;
    let mut centroid = vec![0.0; dim];
    for (vertex, _) in &simplex[..count] {
        for (c, v) in centroid.iter_mut().zip(vertex.iter()) {
            *c += v;
        }
    }
    centroid.iter_mut().for_each(|c| *c /= count as f64);
    centroid
}

/// `origin + coef * (point - origin)`.
fn affine(origin: &[f64], point: &[f64], coef: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(point.iter())
        .map(|(o, p)| o + coef * (p - o))
        .collect()
}

fn clamp_to_bounds(mut point: Vec<f64>, bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    if let Some(b) = bounds {
        for (x, &(lo, hi)) in point.iter_mut().zip(b.iter()) {
            *x = x.clamp(lo, hi);
        }
    }
    point
}
