//! High-frequency residual: surface minus a smoothed baseline

use crate::maybe_rayon::*;
use bare_earth_core::raster::Raster;
use bare_earth_core::Result;

/// `dsm - baseline` per cell; NaN wherever either side is NaN
pub fn residual(dsm: &Raster<f64>, baseline: &Raster<f64>) -> Result<Raster<f64>> {
    dsm.ensure_same_shape(baseline)?;
    let (rows, cols) = dsm.shape();
    let a = dsm.data();
    let b = baseline.data();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| a[(row, col)] - b[(row, col)])
                .collect::<Vec<f64>>()
        })
        .collect();

    dsm.derive(output_data, Some(f64::NAN))
}
