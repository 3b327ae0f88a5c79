//! Inverse Distance Weighting over ground samples
//!
//! Fills the cells the gap filler left empty. Each estimate is the weighted
//! mean of the nearest samples within a search radius, with weights
//! `1 / d^power`.
//!
//! Reference:
//! Shepard, D. (1968). A two-dimensional interpolation function for
//! irregularly-spaced data. ACM National Conference.

use ndarray::Array2;
use crate::maybe_rayon::*;
use bare_earth_core::raster::Raster;
use bare_earth_core::{Error, Result};

use super::kdtree::KdTree;
use super::SamplePoint;

/// Parameters for IDW
#[derive(Debug, Clone, PartialEq)]
pub struct IdwParams {
    /// Distance exponent
    pub power: f64,
    /// Search radius in map units
    pub radius: f64,
    /// Nearest samples used per estimate
    pub max_points: usize,
    /// Closer than this, the sample value is used directly
    pub snap_distance: f64,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            radius: f64::INFINITY,
            max_points: 16,
            snap_distance: 1e-10,
        }
    }
}

impl IdwParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.power.is_finite() && self.power > 0.0) {
            return Err(Error::invalid("idw_power", self.power, "must be a positive number"));
        }
        if !(self.radius > 0.0) {
            return Err(Error::invalid("idw_radius", self.radius, "must be positive"));
        }
        if self.max_points == 0 {
            return Err(Error::invalid("idw_max_points", self.max_points, "must be at least 1"));
        }
        Ok(())
    }
}

/// IDW estimator over a fixed sample set
#[derive(Debug, Clone)]
pub struct IdwInterpolator {
    tree: KdTree,
    params: IdwParams,
}

impl IdwInterpolator {
    pub fn new(samples: &[SamplePoint], params: IdwParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            tree: KdTree::build(samples),
            params,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.tree.len()
    }

    /// Estimate at (x, y), `None` when no sample lies within the radius
    pub fn estimate(&self, x: f64, y: f64) -> Option<f64> {
        let near = self
            .tree
            .k_nearest_within(x, y, self.params.max_points, self.params.radius);
        let first = near.first()?;
        let snap = self.params.snap_distance;
        if first.distance_sq < snap * snap {
            return Some(first.point.value);
        }

        let half_power = self.params.power / 2.0;
        let (sum_w, sum_wz) = near.iter().fold((0.0, 0.0), |(sw, swz), r| {
            let w = 1.0 / r.distance_sq.powf(half_power);
            (sw + w, swz + w * r.point.value)
        });
        (sum_w > 0.0).then(|| sum_wz / sum_w)
    }
}

/// Fill the NaN cells of `surface` for which `eligible` is true.
///
/// Returns the new surface and the number of cells filled. Cells with no
/// sample in range stay NaN.
pub fn idw_fill(
    surface: &Raster<f64>,
    eligible: &Array2<bool>,
    interpolator: &IdwInterpolator,
) -> Result<(Raster<f64>, usize)> {
    let (rows, cols) = surface.shape();
    if eligible.dim() != (rows, cols) {
        let (ar, ac) = eligible.dim();
        return Err(Error::SizeMismatch { er: rows, ec: cols, ar, ac });
    }
    let data = surface.data();

    let output: Vec<(f64, bool)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let z = data[(row, col)];
                    if !z.is_nan() || !eligible[(row, col)] {
                        return (z, false);
                    }
                    let (x, y) = surface.pixel_to_geo(col, row);
                    match interpolator.estimate(x, y) {
                        Some(v) => (v, true),
                        None => (f64::NAN, false),
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let filled = output.iter().filter(|(_, f)| *f).count();
    let values = output.into_iter().map(|(v, _)| v).collect();
    Ok((surface.derive(values, Some(f64::NAN))?, filled))
}
