//! Windowed variance and Shannon entropy
//!
//! Entropy uses one fixed discretisation for the whole grid: values are
//! quantised into [`ENTROPY_BINS`] equal bins spanning the global finite
//! min..max of the input, so entropies of different windows are directly
//! comparable. Entropy is in bits.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use crate::maybe_rayon::*;
use bare_earth_core::raster::Raster;
use bare_earth_core::{Error, Result};

/// Number of entropy bins
pub const ENTROPY_BINS: usize = 16;

const NO_BIN: u8 = u8::MAX;

/// Which surface texture is measured on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureSource {
    /// The smoothed DSM
    Baseline,
    /// DSM minus baseline
    #[default]
    Residual,
}

/// Texture analysis settings. Present in the configuration only when
/// texture analysis is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureParams {
    /// Odd window side, 3 to 9
    pub window_size: usize,
    /// Absolute variance cutoff used in fixed threshold mode
    pub variance_threshold: f64,
    /// Absolute entropy cutoff (bits) used in fixed threshold mode
    pub entropy_threshold: f64,
    pub source: TextureSource,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            window_size: 5,
            variance_threshold: 0.5,
            entropy_threshold: 2.0,
            source: TextureSource::Residual,
        }
    }
}

impl TextureParams {
    pub fn validate(&self) -> Result<()> {
        let w = self.window_size;
        if !(3..=9).contains(&w) || w % 2 == 0 {
            return Err(Error::invalid("texture_window", w, "must be odd and between 3 and 9"));
        }
        for (name, v) in [
            ("variance_threshold", self.variance_threshold),
            ("entropy_threshold", self.entropy_threshold),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(Error::invalid(name, v, "must be a non-negative number"));
            }
        }
        Ok(())
    }
}

/// Variance and entropy grids
#[derive(Debug, Clone)]
pub struct TextureGrids {
    pub variance: Raster<f64>,
    pub entropy: Raster<f64>,
}

/// Window start along an axis, shifted inward at the edges.
/// Returns (start, len); the whole axis when it is shorter than the window.
#[inline]
fn window_span(i: usize, n: usize, size: usize) -> (usize, usize) {
    if n <= size {
        return (0, n);
    }
    let start = i.saturating_sub(size / 2).min(n - size);
    (start, size)
}

fn quantise(data: &Array2<f64>) -> Array2<u8> {
    let (vmin, vmax) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = vmax - vmin;

    data.mapv(|v| {
        if !v.is_finite() {
            NO_BIN
        } else if range > 0.0 {
            let bin = ((v - vmin) / range * ENTROPY_BINS as f64) as usize;
            bin.min(ENTROPY_BINS - 1) as u8
        } else {
            0
        }
    })
}

/// Compute windowed variance and entropy.
///
/// Edge windows are shifted inward. No-data neighbours are skipped; a
/// no-data centre gives no-data in both outputs.
pub fn local_texture(grid: &Raster<f64>, params: &TextureParams) -> Result<TextureGrids> {
    params.validate()?;

    let (rows, cols) = grid.shape();
    let data = grid.data();
    let bins = quantise(data);
    let size = params.window_size;

    let cells: Vec<(f64, f64)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![(f64::NAN, f64::NAN); cols];
            let mut counts = [0usize; ENTROPY_BINS];
            let (r0, rn) = window_span(row, rows, size);

            for (col, out) in row_data.iter_mut().enumerate() {
                if !data[(row, col)].is_finite() {
                    continue;
                }
                let (c0, cn) = window_span(col, cols, size);

                counts.iter_mut().for_each(|c| *c = 0);
                let mut n = 0usize;
                let mut sum = 0.0;
                let mut sum_sq = 0.0;
                let z0 = data[(row, col)];

                for r in r0..r0 + rn {
                    for c in c0..c0 + cn {
                        let v = data[(r, c)];
                        if !v.is_finite() {
                            continue;
                        }
                        // Shifted by the centre to keep the sums well conditioned
                        let d = v - z0;
                        sum += d;
                        sum_sq += d * d;
                        n += 1;
                        counts[bins[(r, c)] as usize] += 1;
                    }
                }

                let nf = n as f64;
                let mean = sum / nf;
                let variance = (sum_sq / nf - mean * mean).max(0.0);
                let entropy = counts
                    .iter()
                    .filter(|&&k| k > 0)
                    .map(|&k| {
                        let p = k as f64 / nf;
                        -p * p.log2()
                    })
                    .sum::<f64>();

                *out = (variance, entropy.max(0.0));
            }
            row_data
        })
        .collect();

    let (variance, entropy): (Vec<f64>, Vec<f64>) = cells.into_iter().unzip();
    Ok(TextureGrids {
        variance: grid.derive(variance, Some(f64::NAN))?,
        entropy: grid.derive(entropy, Some(f64::NAN))?,
    })
}
