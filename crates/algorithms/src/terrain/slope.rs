//! Slope from a surface
//!
//! Horn (1981) weighted differences over the clamped 3x3 window, in degrees.

use bare_earth_core::raster::Raster;
use bare_earth_core::{Algorithm, Error, Result};

use super::derivatives::map_derivatives;

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Horizontal unit conversion, applied to the cell size
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self { z_factor: 1.0 }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Slope in degrees using Horn's method, edges clamped to the grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Calculate slope in degrees
///
/// ```text
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * cellsize)
/// dz/dy = ((a + 2b + c) - (g + 2h + i)) / (8 * cellsize)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
/// ```
///
/// Edge cells use a window shifted inward. Any window touching no-data
/// yields NaN.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    if !(params.z_factor.is_finite() && params.z_factor > 0.0) {
        return Err(Error::invalid("z_factor", params.z_factor, "must be positive"));
    }

    map_derivatives(dem, params.z_factor, |d| {
        d.horn_x.hypot(d.horn_y).atan().to_degrees()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bare_earth_core::GeoTransform;

    fn ramp(degrees: f64, rows: usize, cols: usize, cell: f64) -> Raster<f64> {
        let rise = degrees.to_radians().tan() * cell;
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64 * cell, cell, -cell));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, col as f64 * rise).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_slope_flat() {
        let mut dem: Raster<f64> = Raster::filled(10, 10, 100.0);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));

        let result = slope(&dem, SlopeParams::default()).unwrap();
        for &v in result.data().iter() {
            assert_eq!(v, 0.0, "Expected 0 slope for flat surface, got {}", v);
        }
    }

    #[test]
    fn test_slope_ramp_including_edges() {
        let dem = ramp(20.0, 8, 8, 2.0);
        let result = slope(&dem, SlopeParams::default()).unwrap();

        for &(r, c) in &[(0, 0), (7, 7), (0, 4), (4, 4)] {
            let v = result.get(r, c).unwrap();
            assert!((v - 20.0).abs() < 1e-9, "Expected 20 degrees at ({}, {}), got {}", r, c, v);
        }
    }

    #[test]
    fn test_slope_nodata_propagates() {
        let mut dem = ramp(10.0, 6, 6, 1.0);
        dem.set(3, 3, f64::NAN).unwrap();
        let result = slope(&dem, SlopeParams::default()).unwrap();

        assert!(result.get(3, 3).unwrap().is_nan());
        assert!(result.get(2, 2).unwrap().is_nan());
        assert!(result.get(4, 4).unwrap().is_nan());
        assert!(!result.get(0, 0).unwrap().is_nan());
        assert_eq!(result.shape(), dem.shape());
    }

    #[test]
    fn test_algorithm_trait() {
        let dem = ramp(5.0, 5, 5, 1.0);
        let algo = Slope;
        assert_eq!(algo.name(), "Slope");
        let result = algo.execute_default(dem).unwrap();
        assert!((result.get(2, 2).unwrap() - 5.0).abs() < 1e-9);
    }
}
