//! Per-metric cutoffs
//!
//! Percentile mode adapts the cutoffs to each surface: slope, variance and
//! entropy use P(p) of their finite values; curvature and residual are
//! signed and judged by magnitude, so their cutoff is max(P(p), -P(100-p)).
//! Fixed mode takes slope, curvature and residual cutoffs as given; texture
//! cutoffs then come from the texture settings.

use serde::{Deserialize, Serialize};
use tracing::debug;
use bare_earth_core::{Error, Result};

use super::MetricGrids;
use crate::statistics::metric_percentile;
use crate::texture::TextureParams;

/// Lower bound for percentile-derived cutoffs, so rounding noise on a flat
/// surface is never classified
pub const METRIC_NOISE_FLOOR: f64 = 1e-9;

/// Percentile (50 to 99) per metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercentileSet {
    pub slope: f64,
    pub curvature: f64,
    pub residual: f64,
    pub variance: f64,
    pub entropy: f64,
}

impl Default for PercentileSet {
    fn default() -> Self {
        Self {
            slope: 90.0,
            curvature: 90.0,
            residual: 90.0,
            variance: 90.0,
            entropy: 90.0,
        }
    }
}

/// Absolute cutoffs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedThresholds {
    pub slope_degrees: f64,
    /// Curvature magnitude
    pub curvature: f64,
    /// Residual magnitude, elevation units
    pub residual: f64,
}

impl Default for FixedThresholds {
    fn default() -> Self {
        Self {
            slope_degrees: 15.0,
            curvature: 0.5,
            residual: 2.0,
        }
    }
}

/// How cutoffs are obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ThresholdMode {
    Percentile(PercentileSet),
    Fixed(FixedThresholds),
}

impl Default for ThresholdMode {
    fn default() -> Self {
        ThresholdMode::Percentile(PercentileSet::default())
    }
}

impl ThresholdMode {
    pub fn validate(&self) -> Result<()> {
        match self {
            ThresholdMode::Percentile(p) => {
                for (name, v) in [
                    ("slope_percentile", p.slope),
                    ("curvature_percentile", p.curvature),
                    ("residual_percentile", p.residual),
                    ("variance_percentile", p.variance),
                    ("entropy_percentile", p.entropy),
                ] {
                    if !(50.0..=99.0).contains(&v) {
                        return Err(Error::invalid(name, v, "must be between 50 and 99"));
                    }
                }
            }
            ThresholdMode::Fixed(f) => {
                for (name, v) in [
                    ("slope_threshold", f.slope_degrees),
                    ("curvature_threshold", f.curvature),
                    ("residual_threshold", f.residual),
                ] {
                    if !(v.is_finite() && v >= 0.0) {
                        return Err(Error::invalid(name, v, "must be a non-negative number"));
                    }
                }
                if f.slope_degrees >= 90.0 {
                    return Err(Error::invalid("slope_threshold", f.slope_degrees, "must be below 90 degrees"));
                }
            }
        }
        Ok(())
    }
}

/// Where a threshold set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    Percentile,
    Fixed,
}

/// Cutoffs actually used by a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSet {
    pub source: ThresholdSource,
    /// Degrees
    pub slope: f64,
    pub curvature: f64,
    pub residual: f64,
    /// Only with texture analysis
    pub variance: Option<f64>,
    pub entropy: Option<f64>,
}

/// Derive the threshold set for a run.
///
/// Percentile mode fails with [`Error::StatisticalDegeneracy`] when a
/// metric has no finite values.
pub fn derive_thresholds(
    metrics: &MetricGrids,
    mode: &ThresholdMode,
    texture: Option<&TextureParams>,
) -> Result<ThresholdSet> {
    mode.validate()?;

    let set = match mode {
        ThresholdMode::Percentile(p) => {
            let floor = |v: f64| v.max(METRIC_NOISE_FLOOR);
            let (variance, entropy) = match &metrics.texture {
                Some(t) => (
                    Some(floor(metric_percentile(&t.variance, p.variance, "variance", false)?)),
                    Some(floor(metric_percentile(&t.entropy, p.entropy, "entropy", false)?)),
                ),
                None => (None, None),
            };
            ThresholdSet {
                source: ThresholdSource::Percentile,
                slope: floor(metric_percentile(&metrics.slope, p.slope, "slope", false)?),
                curvature: floor(metric_percentile(&metrics.curvature, p.curvature, "curvature", true)?),
                residual: floor(metric_percentile(&metrics.residual, p.residual, "residual", true)?),
                variance,
                entropy,
            }
        }
        ThresholdMode::Fixed(f) => {
            let defaults = TextureParams::default();
            let tp = texture.unwrap_or(&defaults);
            let enabled = metrics.texture.is_some();
            ThresholdSet {
                source: ThresholdSource::Fixed,
                slope: f.slope_degrees,
                curvature: f.curvature,
                residual: f.residual,
                variance: enabled.then_some(tp.variance_threshold),
                entropy: enabled.then_some(tp.entropy_threshold),
            }
        }
    };

    debug!(
        "Thresholds ({:?}): slope {:.4}, curvature {:.6}, residual {:.4}, variance {:?}, entropy {:?}",
        set.source, set.slope, set.curvature, set.residual, set.variance, set.entropy
    );
    Ok(set)
}
