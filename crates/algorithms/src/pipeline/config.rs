//! Run configuration
//!
//! Every section deserializes with defaults for missing fields, so a JSON
//! file only needs the options it changes.

use serde::{Deserialize, Serialize};
use bare_earth_core::{Error, Result};

use crate::classification::{MaskFilters, ThresholdMode};
use crate::interpolation::{GapFillParams, InterpolationStrategy};
use crate::terrain::{CurvatureType, GaussianSmoothingParams};
use crate::texture::TextureParams;

/// Output toggles consumed by the file-writing collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Write `reconstruction_report.json`
    pub write_report: bool,
    /// Put intermediate rasters under `intermediate/`
    pub organize_files: bool,
    /// Return the metric grids with the products
    pub keep_metrics: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            write_report: true,
            organize_files: true,
            keep_metrics: false,
        }
    }
}

/// Full configuration of one reconstruction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BareEarthConfig {
    /// Pre-filter for the residual baseline and post-filter of the filled surface
    pub smoothing: GaussianSmoothingParams,
    pub thresholds: ThresholdMode,
    pub curvature_type: CurvatureType,
    /// Texture analysis, enabled when present
    pub texture: Option<TextureParams>,
    pub filters: MaskFilters,
    /// Buffer distance in map units
    pub buffer_distance: f64,
    pub gap_fill: GapFillParams,
    pub interpolation: InterpolationStrategy,
    /// Replace kept ground cells with their smoothed value
    pub smooth_ground: bool,
    pub output: OutputOptions,
}

impl Default for BareEarthConfig {
    fn default() -> Self {
        Self {
            smoothing: GaussianSmoothingParams::default(),
            thresholds: ThresholdMode::default(),
            curvature_type: CurvatureType::default(),
            texture: None,
            filters: MaskFilters::default(),
            buffer_distance: 1.0,
            gap_fill: GapFillParams::default(),
            interpolation: InterpolationStrategy::default(),
            smooth_ground: false,
            output: OutputOptions::default(),
        }
    }
}

impl BareEarthConfig {
    /// Reject out-of-range values before any stage runs
    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate()?;
        self.thresholds.validate()?;
        if let Some(t) = &self.texture {
            t.validate()?;
        }
        if !(self.buffer_distance.is_finite() && self.buffer_distance >= 0.0) {
            return Err(Error::invalid(
                "buffer_distance",
                self.buffer_distance,
                "must be a non-negative number",
            ));
        }
        self.gap_fill.validate()?;
        self.interpolation.validate()?;
        Ok(())
    }

    /// True when exactly one category filter is selected but texture analysis
    /// is off. Non-ground cells are then not split, so every one of them is
    /// masked whatever the filter says.
    pub fn single_filter_without_texture(&self) -> bool {
        self.texture.is_none() && self.filters.anthropogenic != self.filters.vegetation
    }

    /// Copy with resolution-dependent parameters scaled to `cell_size`
    pub fn auto_scaled(&self, cell_size: f64) -> Result<Self> {
        let scaled = ScaledParameters::for_cell_size(cell_size)?;
        let mut config = self.clone();
        config.smoothing.sigma = scaled.sigma;
        config.smoothing.radius = scaled.kernel_radius;
        config.gap_fill.max_distance = scaled.fill_distance;
        Ok(config)
    }
}

/// Parameters scaled from their values at a 2 m reference resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledParameters {
    pub sigma: f64,
    pub kernel_radius: usize,
    pub fill_distance: usize,
}

impl ScaledParameters {
    /// Smoothing covers about 3 m, the kernel 8 m and the fill reach 100 m
    /// on the ground, whatever the cell size.
    pub fn for_cell_size(cell_size: f64) -> Result<Self> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(Error::invalid("cell_size", cell_size, "must be positive"));
        }
        Ok(Self {
            sigma: (3.0 / cell_size).clamp(0.5, 5.0),
            kernel_radius: ((8.0 / cell_size).floor() as usize).clamp(1, 15),
            fill_distance: ((100.0 / cell_size).floor() as usize).clamp(1, 1000),
        })
    }
}
