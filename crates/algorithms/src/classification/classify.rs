//! Per-cell ground classification
//!
//! A valid cell is non-ground when slope, |curvature| or |residual| exceeds
//! its cutoff (strictly). With texture analysis and at least one category
//! filter, non-ground cells split into vegetation (variance or entropy
//! above cutoff) and anthropogenic. Otherwise the result is binary.

use serde::{Deserialize, Serialize};
use crate::maybe_rayon::*;
use bare_earth_core::raster::Raster;
use bare_earth_core::Result;

use super::{MetricGrids, ThresholdSet};

/// No-data code of classification and mask grids
pub const CLASS_NODATA: u8 = 255;

/// Classification codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Category {
    Ground = 0,
    Vegetation = 1,
    Anthropogenic = 2,
    /// Unsplit non-ground, binary mode only
    NonGround = 3,
}

impl Category {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Category::Ground),
            1 => Some(Category::Vegetation),
            2 => Some(Category::Anthropogenic),
            3 => Some(Category::NonGround),
            _ => None,
        }
    }

    pub fn is_ground(self) -> bool {
        self == Category::Ground
    }
}

/// Which non-ground categories are removed from the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskFilters {
    pub anthropogenic: bool,
    pub vegetation: bool,
}

impl Default for MaskFilters {
    fn default() -> Self {
        Self {
            anthropogenic: true,
            vegetation: false,
        }
    }
}

impl MaskFilters {
    pub fn any(&self) -> bool {
        self.anthropogenic || self.vegetation
    }

    fn targets(&self, category: Category) -> bool {
        match category {
            Category::Ground => false,
            Category::Vegetation => self.vegetation,
            Category::Anthropogenic => self.anthropogenic,
            Category::NonGround => true,
        }
    }
}

/// Per-category cell counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub valid_cells: usize,
    pub ground: usize,
    pub vegetation: usize,
    pub anthropogenic: usize,
    /// Unsplit non-ground (binary mode)
    pub non_ground: usize,
    /// Cells selected for masking before buffering
    pub targeted: usize,
}

impl CategoryStats {
    /// Every non-ground cell, whatever its category
    pub fn total_non_ground(&self) -> usize {
        self.vegetation + self.anthropogenic + self.non_ground
    }

    /// Share of valid cells, in percent
    pub fn percent(&self, count: usize) -> f64 {
        if self.valid_cells == 0 {
            0.0
        } else {
            100.0 * count as f64 / self.valid_cells as f64
        }
    }
}

/// Classifier output
#[derive(Debug, Clone)]
pub struct Classification {
    /// [`Category`] codes, [`CLASS_NODATA`] on DSM no-data
    pub classes: Raster<u8>,
    /// 1 where the cell is to be masked, 0 otherwise, [`CLASS_NODATA`] on no-data
    pub targets: Raster<u8>,
    pub stats: CategoryStats,
    /// Whether non-ground was split into vegetation / anthropogenic
    pub split: bool,
}

#[inline]
fn exceeds(value: f64, threshold: f64) -> bool {
    value.is_finite() && value > threshold
}

/// Classify every valid DSM cell against the threshold set
pub fn classify(
    dsm: &Raster<f64>,
    metrics: &MetricGrids,
    thresholds: &ThresholdSet,
    filters: MaskFilters,
) -> Result<Classification> {
    dsm.ensure_same_shape(&metrics.slope)?;
    dsm.ensure_same_shape(&metrics.curvature)?;
    dsm.ensure_same_shape(&metrics.residual)?;

    let texture = match (&metrics.texture, thresholds.variance, thresholds.entropy) {
        (Some(t), Some(tv), Some(te)) if filters.any() => {
            dsm.ensure_same_shape(&t.variance)?;
            dsm.ensure_same_shape(&t.entropy)?;
            Some((t.variance.data(), t.entropy.data(), tv, te))
        }
        _ => None,
    };
    let split = texture.is_some();

    let (rows, cols) = dsm.shape();
    let z = dsm.data();
    let slope = metrics.slope.data();
    let curv = metrics.curvature.data();
    let res = metrics.residual.data();

    let cells: Vec<(u8, u8)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    let idx = (row, col);
                    if z[idx].is_nan() {
                        return (CLASS_NODATA, CLASS_NODATA);
                    }
                    let non_ground = exceeds(slope[idx], thresholds.slope)
                        || exceeds(curv[idx].abs(), thresholds.curvature)
                        || exceeds(res[idx].abs(), thresholds.residual);

                    let category = match (non_ground, texture) {
                        (false, _) => Category::Ground,
                        (true, Some((var, ent, tv, te))) => {
                            if exceeds(var[idx], tv) || exceeds(ent[idx], te) {
                                Category::Vegetation
                            } else {
                                Category::Anthropogenic
                            }
                        }
                        (true, None) => Category::NonGround,
                    };
                    (category.code(), filters.targets(category) as u8)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut stats = CategoryStats::default();
    for &(code, target) in &cells {
        match Category::from_code(code) {
            Some(Category::Ground) => stats.ground += 1,
            Some(Category::Vegetation) => stats.vegetation += 1,
            Some(Category::Anthropogenic) => stats.anthropogenic += 1,
            Some(Category::NonGround) => stats.non_ground += 1,
            None => continue,
        }
        stats.valid_cells += 1;
        stats.targeted += (target == 1) as usize;
    }

    let (classes, targets): (Vec<u8>, Vec<u8>) = cells.into_iter().unzip();
    Ok(Classification {
        classes: dsm.derive(classes, Some(CLASS_NODATA))?,
        targets: dsm.derive(targets, Some(CLASS_NODATA))?,
        stats,
        split,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::ThresholdSource;
    use crate::texture::TextureGrids;

    fn row(values: &[f64]) -> Raster<f64> {
        Raster::from_vec(values.to_vec(), 1, values.len()).unwrap()
    }

    /// Cells: ground, steep+textured, steep+smooth, high residual+smooth, no-data
    fn fixture(texture: bool) -> (Raster<f64>, MetricGrids) {
        let dsm = row(&[1.0, 1.0, 1.0, 1.0, f64::NAN]);
        let metrics = MetricGrids {
            baseline: dsm.clone(),
            slope: row(&[1.0, 30.0, 30.0, 1.0, f64::NAN]),
            curvature: row(&[0.0, 0.0, 0.0, 0.0, f64::NAN]),
            residual: row(&[0.1, 0.1, 0.1, -5.0, f64::NAN]),
            texture: texture.then(|| TextureGrids {
                variance: row(&[0.0, 3.0, 0.0, 0.0, f64::NAN]),
                entropy: row(&[0.0, 0.0, 0.0, 0.0, f64::NAN]),
            }),
        };
        (dsm, metrics)
    }

    fn thresholds(texture: bool) -> ThresholdSet {
        ThresholdSet {
            source: ThresholdSource::Fixed,
            slope: 15.0,
            curvature: 0.5,
            residual: 2.0,
            variance: texture.then_some(1.0),
            entropy: texture.then_some(2.0),
        }
    }

    fn codes(r: &Raster<u8>) -> Vec<u8> {
        r.data().iter().copied().collect()
    }

    #[test]
    fn test_split_with_both_filters() {
        let (dsm, m) = fixture(true);
        let filters = MaskFilters { anthropogenic: true, vegetation: true };
        let c = classify(&dsm, &m, &thresholds(true), filters).unwrap();
        assert!(c.split);
        assert_eq!(codes(&c.classes), vec![0, 1, 2, 2, 255]);
        assert_eq!(codes(&c.targets), vec![0, 1, 1, 1, 255]);
        assert_eq!(c.stats.valid_cells, 4);
        assert_eq!(c.stats.total_non_ground(), 3);
        assert_eq!(c.stats.targeted, 3);
    }

    #[test]
    fn test_single_filter_leaves_other_category_untouched() {
        let (dsm, m) = fixture(true);
        let filters = MaskFilters { anthropogenic: true, vegetation: false };
        let c = classify(&dsm, &m, &thresholds(true), filters).unwrap();
        assert_eq!(codes(&c.classes), vec![0, 1, 2, 2, 255]);
        // Vegetation is still reported but not masked
        assert_eq!(codes(&c.targets), vec![0, 0, 1, 1, 255]);
        assert_eq!(c.stats.vegetation, 1);
        assert_eq!(c.stats.targeted, 2);
    }

    #[test]
    fn test_no_filters_is_binary_even_with_texture() {
        let (dsm, m) = fixture(true);
        let filters = MaskFilters { anthropogenic: false, vegetation: false };
        let c = classify(&dsm, &m, &thresholds(true), filters).unwrap();
        assert!(!c.split);
        assert_eq!(codes(&c.classes), vec![0, 3, 3, 3, 255]);
        assert_eq!(codes(&c.targets), vec![0, 1, 1, 1, 255]);
    }

    #[test]
    fn test_texture_off_is_binary() {
        let (dsm, m) = fixture(false);
        let c = classify(&dsm, &m, &thresholds(false), MaskFilters::default()).unwrap();
        assert_eq!(codes(&c.classes), vec![0, 3, 3, 3, 255]);
        assert!((c.stats.percent(c.stats.non_ground) - 75.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_to_threshold_is_ground_and_nan_metric_ignored() {
        let dsm = row(&[1.0, 1.0]);
        let m = MetricGrids {
            baseline: dsm.clone(),
            slope: row(&[15.0, f64::NAN]),
            curvature: row(&[-0.5, f64::NAN]),
            residual: row(&[2.0, f64::NAN]),
            texture: None,
        };
        let c = classify(&dsm, &m, &thresholds(false), MaskFilters::default()).unwrap();
        assert_eq!(codes(&c.classes), vec![0, 0]);
    }
}
