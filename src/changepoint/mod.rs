//! Changepoint detection on the decomposition residual.
//!
//! # Available Algorithms
//!
//! - **PELT**: Pruned Exact Linear Time, exact with O(n) average complexity
//!
//! # Cost Functions
//!
//! - **L2**: mean shifts
//! - **MeanVariance**: joint mean and variance changes (default)

pub mod cost;
pub mod pelt;
mod residual;

pub use cost::{l2_cost, mean_variance_cost, segment_cost, total_cost, CostFunction};
pub use pelt::{pelt_detect, PeltConfig, PeltResult, RELATIVE_VARIANCE_FLOOR};
pub use residual::{detect_changepoints, ChangePoint, ChangepointReport};
