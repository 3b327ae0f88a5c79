//! Final bare-earth surface interpolation
//!
//! Both strategies start from the same coarse surface: original DSM values
//! on kept cells, the post-smoothed filled value on masked cells, and one
//! IDW pass over the kept ground samples for masked cells the gap filler
//! could not reach.
//!
//! `Enhanced` then runs refinement passes. Each pass smooths the current
//! surface and moves masked cells towards it by `blend`; kept cells never
//! change. A pass is accepted only if the seam discontinuity does not grow,
//! so the enhanced seam is never larger than the simple one.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use bare_earth_core::raster::{Neighborhood, Raster};
use bare_earth_core::{Error, Result};

use crate::morphology::MASKED;
use crate::terrain::{gaussian_smoothing, GaussianSmoothingParams};

use super::idw::{idw_fill, IdwInterpolator, IdwParams};
use super::SamplePoint;

/// Refinement settings of the enhanced strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedParams {
    /// Maximum refinement passes
    pub passes: usize,
    /// Weight of the smoothed value in each pass, in (0, 1]
    pub blend: f64,
    /// Smoothing sigma of a pass, in cells
    pub sigma: f64,
    /// Smoothing kernel radius of a pass, in cells
    pub radius: usize,
}

impl Default for EnhancedParams {
    fn default() -> Self {
        Self {
            passes: 3,
            blend: 0.5,
            sigma: 1.0,
            radius: 3,
        }
    }
}

/// Interpolation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum InterpolationStrategy {
    /// Coarse surface only
    Simple,
    /// Coarse surface plus seam-suppressing refinement
    Enhanced(EnhancedParams),
}

impl Default for InterpolationStrategy {
    fn default() -> Self {
        InterpolationStrategy::Enhanced(EnhancedParams::default())
    }
}

impl InterpolationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            InterpolationStrategy::Simple => "simple",
            InterpolationStrategy::Enhanced(_) => "enhanced",
        }
    }

    pub fn validate(&self) -> Result<()> {
        let InterpolationStrategy::Enhanced(p) = self else {
            return Ok(());
        };
        if p.passes == 0 {
            return Err(Error::invalid("enhanced_passes", p.passes, "must be at least 1"));
        }
        if !(p.blend > 0.0 && p.blend <= 1.0) {
            return Err(Error::invalid("enhanced_blend", p.blend, "must be in (0, 1]"));
        }
        GaussianSmoothingParams::single(p.sigma, p.radius).validate()
    }
}

/// Options shared by both strategies
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceOptions {
    /// IDW search radius, in cells
    pub fill_distance: usize,
    /// Take the smoothed value on kept ground cells too
    pub smooth_ground: bool,
}

/// Interpolated surface and its statistics
#[derive(Debug, Clone)]
pub struct SurfaceResult {
    pub surface: Raster<f64>,
    /// Cells filled by the IDW pass
    pub idw_cells: usize,
    /// Refinement passes accepted
    pub passes_applied: usize,
    /// Seam discontinuity of the coarse surface
    pub seam_simple: f64,
    /// Seam discontinuity of the returned surface
    pub seam_final: f64,
    /// Masked cells still without a value
    pub unreachable_cells: usize,
}

/// Largest |masked - kept| difference over 4-neighbour pairs.
///
/// Pairs with a NaN side are skipped; no pair gives 0.
pub fn seam_discontinuity(surface: &Raster<f64>, mask: &Raster<u8>) -> Result<f64> {
    surface.ensure_same_shape(mask)?;
    let (rows, cols) = surface.shape();
    let z = surface.data();
    let m = mask.data();

    let rook = Neighborhood::Rook.offsets();
    let mut seam = 0.0_f64;
    for ((row, col), &code) in m.indexed_iter() {
        if code != MASKED || z[(row, col)].is_nan() {
            continue;
        }
        for &(dr, dc) in &rook {
            if let Some(idx) = Neighborhood::shift(row, col, dr, dc, rows, cols) {
                if m[idx] != MASKED && !z[idx].is_nan() {
                    seam = seam.max((z[(row, col)] - z[idx]).abs());
                }
            }
        }
    }
    Ok(seam)
}

fn coarse_surface(dsm: &Raster<f64>, mask: &Raster<u8>, smoothed: &Raster<f64>, smooth_ground: bool) -> Array2<f64> {
    let (z, m, s) = (dsm.data(), mask.data(), smoothed.data());
    Array2::from_shape_fn(dsm.shape(), |idx| {
        if z[idx].is_nan() {
            f64::NAN
        } else if m[idx] == MASKED || smooth_ground {
            s[idx]
        } else {
            z[idx]
        }
    })
}

fn ground_samples(dsm: &Raster<f64>, mask: &Raster<u8>) -> Vec<SamplePoint> {
    let m = mask.data();
    dsm.data()
        .indexed_iter()
        .filter(|&(idx, z)| m[idx] != MASKED && !z.is_nan())
        .map(|((row, col), &z)| {
            let (x, y) = dsm.pixel_to_geo(col, row);
            SamplePoint::new(x, y, z)
        })
        .collect()
}

/// Build the bare-earth surface.
///
/// * `dsm` - NaN no-data DSM
/// * `mask` - buffered mask, 1 on masked cells
/// * `smoothed` - post-smoothed gap-filled surface
pub fn interpolate_surface(
    dsm: &Raster<f64>,
    mask: &Raster<u8>,
    smoothed: &Raster<f64>,
    strategy: &InterpolationStrategy,
    options: SurfaceOptions,
) -> Result<SurfaceResult> {
    strategy.validate()?;
    dsm.ensure_same_shape(mask)?;
    dsm.ensure_same_shape(smoothed)?;

    let (rows, cols) = dsm.shape();
    let mut surface = dsm.with_same_meta::<f64>(rows, cols);
    surface.set_nodata(Some(f64::NAN));
    *surface.data_mut() = coarse_surface(dsm, mask, smoothed, options.smooth_ground);

    let is_masked = Array2::from_shape_fn((rows, cols), |idx| {
        mask.data()[idx] == MASKED && !dsm.data()[idx].is_nan()
    });
    let pending = |s: &Raster<f64>| {
        s.data()
            .iter()
            .zip(is_masked.iter())
            .filter(|&(v, &t)| t && v.is_nan())
            .count()
    };

    let mut idw_cells = 0;
    if pending(&surface) > 0 {
        let samples = ground_samples(dsm, mask);
        let params = IdwParams {
            radius: options.fill_distance as f64 * dsm.cell_size(),
            ..Default::default()
        };
        let idw = IdwInterpolator::new(&samples, params)?;
        debug!(samples = idw.sample_count(), "idw over kept ground cells");
        let (filled, count) = idw_fill(&surface, &is_masked, &idw)?;
        surface = filled;
        idw_cells = count;
    }

    let seam_simple = seam_discontinuity(&surface, mask)?;
    let mut seam_final = seam_simple;
    let mut passes_applied = 0;

    if let InterpolationStrategy::Enhanced(p) = strategy {
        let blur = GaussianSmoothingParams::single(p.sigma, p.radius);
        for pass in 0..p.passes {
            let blurred = gaussian_smoothing(&surface, &blur)?;
            let mut candidate = surface.clone();
            let (cur, b) = (surface.data(), blurred.data());
            for (idx, out) in candidate.data_mut().indexed_iter_mut() {
                if is_masked[idx] && !cur[idx].is_nan() && !b[idx].is_nan() {
                    *out = (1.0 - p.blend) * cur[idx] + p.blend * b[idx];
                }
            }

            let seam = seam_discontinuity(&candidate, mask)?;
            if seam > seam_final {
                debug!(pass, seam, kept = seam_final, "refinement pass rejected");
                break;
            }
            surface = candidate;
            seam_final = seam;
            passes_applied += 1;
        }
    }

    let unreachable_cells = pending(&surface);
    if unreachable_cells > 0 {
        warn!(cells = unreachable_cells, "masked cells left without a ground estimate");
    }

    Ok(SurfaceResult {
        surface,
        idw_cells,
        passes_applied,
        seam_simple,
        seam_final,
        unreachable_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bare_earth_core::GeoTransform;

    /// Sloped DSM with a raised masked block whose filled values are offset
    fn fixture(n: usize) -> (Raster<f64>, Raster<u8>, Raster<f64>) {
        let mut dsm: Raster<f64> = Raster::filled(n, n, 0.0);
        dsm.set_transform(GeoTransform::new(0.0, n as f64, 1.0, -1.0));
        let mut mask: Raster<u8> = dsm.with_same_meta(n, n);
        mask.set_nodata(Some(255));
        let mut smoothed = dsm.clone();
        for r in 0..n {
            for c in 0..n {
                let ground = 0.5 * c as f64;
                let inside = (n / 3..2 * n / 3).contains(&r) && (n / 3..2 * n / 3).contains(&c);
                dsm.set(r, c, if inside { ground + 10.0 } else { ground }).unwrap();
                smoothed.set(r, c, if inside { ground + 1.5 } else { ground }).unwrap();
                if inside {
                    mask.set(r, c, MASKED).unwrap();
                }
            }
        }
        (dsm, mask, smoothed)
    }

    fn options() -> SurfaceOptions {
        SurfaceOptions { fill_distance: 10, smooth_ground: false }
    }

    #[test]
    fn test_simple_uses_filled_values_and_keeps_ground() {
        let (dsm, mask, smoothed) = fixture(12);
        let out = interpolate_surface(&dsm, &mask, &smoothed, &InterpolationStrategy::Simple, options()).unwrap();
        assert_eq!(out.surface.get(5, 5).unwrap(), smoothed.get(5, 5).unwrap());
        assert_eq!(out.surface.get(0, 7).unwrap(), dsm.get(0, 7).unwrap());
        assert_eq!(out.passes_applied, 0);
        assert_eq!(out.seam_simple, out.seam_final);
        assert_eq!(out.unreachable_cells, 0);
    }

    #[test]
    fn test_enhanced_seam_not_larger_than_simple() {
        let (dsm, mask, smoothed) = fixture(15);
        let simple = interpolate_surface(&dsm, &mask, &smoothed, &InterpolationStrategy::Simple, options()).unwrap();
        let enhanced = interpolate_surface(&dsm, &mask, &smoothed, &InterpolationStrategy::default(), options()).unwrap();
        assert!(enhanced.seam_final <= simple.seam_final);
        assert!(enhanced.passes_applied >= 1);
        assert!(enhanced.seam_final < simple.seam_final);
        // Kept cells are identical in both
        for (idx, &code) in mask.data().indexed_iter() {
            if code != MASKED {
                assert_eq!(enhanced.surface.data()[idx], dsm.data()[idx]);
            }
        }
    }

    #[test]
    fn test_idw_covers_unfilled_cells() {
        let (dsm, mask, mut smoothed) = fixture(12);
        smoothed.set(5, 5, f64::NAN).unwrap();
        let out = interpolate_surface(&dsm, &mask, &smoothed, &InterpolationStrategy::Simple, options()).unwrap();
        assert_eq!(out.idw_cells, 1);
        let v = out.surface.get(5, 5).unwrap();
        assert!(v.is_finite() && (0.0..=5.5).contains(&v), "idw value {}", v);
    }

    #[test]
    fn test_unreachable_cells_are_reported_not_invented() {
        let (dsm, mask, mut smoothed) = fixture(12);
        smoothed.set(5, 5, f64::NAN).unwrap();
        let opts = SurfaceOptions { fill_distance: 1, smooth_ground: false };
        let out = interpolate_surface(&dsm, &mask, &smoothed, &InterpolationStrategy::Simple, opts).unwrap();
        assert_eq!(out.unreachable_cells, 1);
        assert!(out.surface.get(5, 5).unwrap().is_nan());
    }

    #[test]
    fn test_dsm_nodata_stays_nodata() {
        let (mut dsm, mask, smoothed) = fixture(12);
        dsm.set(0, 0, f64::NAN).unwrap();
        let out = interpolate_surface(&dsm, &mask, &smoothed, &InterpolationStrategy::default(), options()).unwrap();
        assert!(out.surface.get(0, 0).unwrap().is_nan());
        assert_eq!(out.unreachable_cells, 0);
    }

    #[test]
    fn test_strategy_validation_and_serde() {
        let bad = InterpolationStrategy::Enhanced(EnhancedParams { blend: 0.0, ..Default::default() });
        assert!(bad.validate().is_err());
        let parsed: InterpolationStrategy = serde_json::from_str(r#"{"strategy":"enhanced","passes":5}"#).unwrap();
        assert_eq!(parsed, InterpolationStrategy::Enhanced(EnhancedParams { passes: 5, ..Default::default() }));
        let simple: InterpolationStrategy = serde_json::from_str(r#"{"strategy":"simple"}"#).unwrap();
        assert_eq!(simple.name(), "simple");
    }
}
