//! Surface curvature
//!
//! Second-order derivatives from the clamped 3x3 window
//! (Zevenbergen & Thorne 1987):
//!
//! ```text
//! General  = -(r + t) / 2
//! Profile  = -(r*p² + 2*s*p*q + t*q²) / (p² + q²)
//! Plan     = -(r*q² - 2*s*p*q + t*p²) / (p² + q²)
//! ```
//!
//! Profile and plan curvature are 0 where the surface is flat.

use serde::{Deserialize, Serialize};
use bare_earth_core::raster::Raster;
use bare_earth_core::{Algorithm, Error, Result};

use super::derivatives::{map_derivatives, Derivatives};

/// Which curvature to compute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurvatureType {
    /// Mean curvature
    General,
    /// Along the direction of steepest descent
    #[default]
    Profile,
    /// Perpendicular to the descent direction
    Plan,
}

/// Parameters for curvature calculation
#[derive(Debug, Clone)]
pub struct CurvatureParams {
    pub curvature_type: CurvatureType,
    pub z_factor: f64,
}

impl Default for CurvatureParams {
    fn default() -> Self {
        Self {
            curvature_type: CurvatureType::Profile,
            z_factor: 1.0,
        }
    }
}

/// Curvature algorithm
#[derive(Debug, Clone, Default)]
pub struct Curvature;

impl Algorithm for Curvature {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = CurvatureParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Curvature"
    }

    fn description(&self) -> &'static str {
        "Surface curvature (Zevenbergen & Thorne 1987), edges clamped to the grid"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        curvature(&input, params)
    }
}

fn evaluate(d: &Derivatives, kind: CurvatureType) -> f64 {
    let Derivatives { p, q, r, s, t, .. } = *d;
    let p2q2 = p * p + q * q;
    match kind {
        CurvatureType::General => -(r + t) / 2.0,
        _ if p2q2 < 1e-20 => 0.0,
        CurvatureType::Profile => -(r * p * p + 2.0 * s * p * q + t * q * q) / p2q2,
        CurvatureType::Plan => -(r * q * q - 2.0 * s * p * q + t * p * p) / p2q2,
    }
}

/// Calculate surface curvature (1/m). Positive is concave, negative convex.
pub fn curvature(dem: &Raster<f64>, params: CurvatureParams) -> Result<Raster<f64>> {
    if !(params.z_factor.is_finite() && params.z_factor > 0.0) {
        return Err(Error::invalid("z_factor", params.z_factor, "must be positive"));
    }
    let kind = params.curvature_type;
    map_derivatives(dem, params.z_factor, move |d| evaluate(d, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bare_earth_core::GeoTransform;

    /// Tilted plane z = row + col
    fn tilted_plane() -> Raster<f64> {
        let mut dem = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
        for r in 0..10 {
            for c in 0..10 {
                dem.set(r, c, (r + c) as f64).unwrap();
            }
        }
        dem
    }

    /// Parabolic bowl z = x² + y²
    fn bowl() -> Raster<f64> {
        let mut dem = Raster::new(21, 21);
        dem.set_transform(GeoTransform::new(0.0, 20.0, 1.0, -1.0));
        for r in 0..21 {
            for c in 0..21 {
                let x = c as f64 - 10.0;
                let y = r as f64 - 10.0;
                dem.set(r, c, x * x + y * y).unwrap();
            }
        }
        dem
    }

    #[test]
    fn test_plane_has_zero_curvature_everywhere() {
        let dem = tilted_plane();
        for kind in [CurvatureType::General, CurvatureType::Profile, CurvatureType::Plan] {
            let result = curvature(&dem, CurvatureParams { curvature_type: kind, z_factor: 1.0 }).unwrap();
            for &v in result.data().iter() {
                assert!(v.abs() < 1e-10, "Expected 0 {:?} curvature on a plane, got {}", kind, v);
            }
        }
    }

    #[test]
    fn test_general_curvature_bowl() {
        let result = curvature(&bowl(), CurvatureParams {
            curvature_type: CurvatureType::General,
            z_factor: 1.0,
        }).unwrap();

        // d²z/dx² = d²z/dy² = 2, so general = -2 everywhere
        let val = result.get(10, 10).unwrap();
        assert!((val + 2.0).abs() < 1e-10, "Expected -2, got {}", val);
        let edge = result.get(0, 5).unwrap();
        assert!((edge + 2.0).abs() < 1e-10, "Expected -2 at edge, got {}", edge);
    }

    #[test]
    fn test_profile_curvature_flat_centre_is_zero() {
        let result = curvature(&bowl(), CurvatureParams::default()).unwrap();
        assert_eq!(result.get(10, 10).unwrap(), 0.0);
        assert!(result.get(10, 15).unwrap() < 0.0);
    }

    #[test]
    fn test_default_is_profile() {
        assert_eq!(CurvatureParams::default().curvature_type, CurvatureType::Profile);
        assert_eq!(Curvature.name(), "Curvature");
    }
}
