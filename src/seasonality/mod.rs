//! Seasonal decomposition.
//!
//! - STL: periodic-window seasonal-trend decomposition using LOESS
//! - Classical moving-average decomposition
//! - [`decompose`]: the pipeline stage choosing between them, with fallback

mod decomposition;
mod stl;

pub use decomposition::{
    decompose, DecompositionConfig, DecompositionResult, TrendMethod, MIN_PERIOD,
};
pub use stl::{Stl, StlComponents};
