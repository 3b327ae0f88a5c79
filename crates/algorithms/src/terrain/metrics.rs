//! Terrain metrics of a DSM: baseline, slope, curvature and residual

use tracing::debug;
use bare_earth_core::raster::Raster;
use bare_earth_core::{Error, Result};

use super::{curvature, gaussian_smoothing, residual, slope};
use super::{CurvatureParams, CurvatureType, GaussianSmoothingParams, SlopeParams};

/// Parameters for [`terrain_metrics`]
#[derive(Debug, Clone, Default)]
pub struct TerrainMetricsParams {
    /// Pre-filter producing the baseline
    pub smoothing: GaussianSmoothingParams,
    pub curvature_type: CurvatureType,
}

/// Grids derived from one DSM, all sharing its shape and georeferencing
#[derive(Debug, Clone)]
pub struct TerrainMetrics {
    /// Smoothed DSM; slope and curvature are taken on it
    pub baseline: Raster<f64>,
    /// Degrees
    pub slope: Raster<f64>,
    pub curvature: Raster<f64>,
    /// DSM minus baseline, elevation units
    pub residual: Raster<f64>,
}

/// Compute every terrain metric for a DSM whose no-data is NaN.
///
/// Fails with [`Error::Input`] on an empty or entirely no-data surface.
pub fn terrain_metrics(dsm: &Raster<f64>, params: &TerrainMetricsParams) -> Result<TerrainMetrics> {
    if dsm.is_empty() {
        return Err(Error::Input("DSM has no cells".into()));
    }
    if dsm.valid_count() == 0 {
        return Err(Error::Input("DSM contains only no-data cells".into()));
    }
    let cell_size = dsm.cell_size();
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(Error::Input(format!("DSM cell size {} is not positive", cell_size)));
    }

    let baseline = gaussian_smoothing(dsm, &params.smoothing)?;
    let slope = slope(&baseline, SlopeParams::default())?;
    let curvature = curvature(&baseline, CurvatureParams {
        curvature_type: params.curvature_type,
        z_factor: 1.0,
    })?;
    let residual = residual(dsm, &baseline)?;

    debug!(
        "Terrain metrics on {} x {} grid, cell size {}",
        dsm.cols(),
        dsm.rows(),
        cell_size
    );

    Ok(TerrainMetrics { baseline, slope, curvature, residual })
}
