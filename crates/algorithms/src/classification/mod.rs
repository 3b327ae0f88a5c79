//! Threshold engine and per-cell ground classification
//!
//! - **thresholds**: percentile-adaptive or fixed cutoffs per metric
//! - **classify**: ground / vegetation / anthropogenic labelling and the
//!   selection of cells to mask

mod classify;
mod thresholds;

pub use classify::{classify, Category, CategoryStats, Classification, MaskFilters, CLASS_NODATA};
pub use thresholds::{
    derive_thresholds, FixedThresholds, PercentileSet, ThresholdMode, ThresholdSet, ThresholdSource,
    METRIC_NOISE_FLOOR,
};

use bare_earth_core::raster::Raster;

use crate::terrain::TerrainMetrics;
use crate::texture::TextureGrids;

/// Every metric grid of one run, all on the DSM's grid
#[derive(Debug, Clone)]
pub struct MetricGrids {
    pub baseline: Raster<f64>,
    pub slope: Raster<f64>,
    pub curvature: Raster<f64>,
    pub residual: Raster<f64>,
    /// Present when texture analysis is enabled
    pub texture: Option<TextureGrids>,
}

impl MetricGrids {
    pub fn new(terrain: TerrainMetrics, texture: Option<TextureGrids>) -> Self {
        Self {
            baseline: terrain.baseline,
            slope: terrain.slope,
            curvature: terrain.curvature,
            residual: terrain.residual,
            texture,
        }
    }
}
