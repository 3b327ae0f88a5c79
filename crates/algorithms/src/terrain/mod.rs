//! Terrain metrics and the Gaussian smoother
//!
//! - Slope (Horn 1981) and curvature (Zevenbergen & Thorne 1987) over a
//!   3x3 window clamped to the grid boundary
//! - Separable Gaussian smoothing with no-data renormalisation
//! - Residual against the smoothed baseline

mod curvature;
pub mod derivatives;
mod metrics;
mod residual;
mod slope;
mod smoothing;

pub use curvature::{curvature, Curvature, CurvatureParams, CurvatureType};
pub use metrics::{terrain_metrics, TerrainMetrics, TerrainMetricsParams};
pub use residual::residual;
pub use slope::{slope, Slope, SlopeParams};
pub use smoothing::{gaussian_smoothing, GaussianSmoothing, GaussianSmoothingParams, SigmaSchedule};
