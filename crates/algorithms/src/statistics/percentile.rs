//! Percentiles over the finite values of a grid
//!
//! Linear interpolation between closest ranks: rank = p/100 * (n - 1),
//! the same definition as NumPy's default.

use bare_earth_core::raster::Raster;
use bare_earth_core::{Error, Result};

/// Finite values of a grid, sorted ascending
#[derive(Debug, Clone)]
pub struct SortedSample {
    values: Vec<f64>,
}

impl SortedSample {
    /// Collect and sort the finite values of `grid`
    pub fn from_raster(grid: &Raster<f64>) -> Self {
        Self::from_values(grid.data().iter().copied())
    }

    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        values.sort_unstable_by(f64::total_cmp);
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Percentile `p` in [0, 100], `None` for an empty sample
    pub fn percentile(&self, p: f64) -> Option<f64> {
        let n = self.values.len();
        if n == 0 {
            return None;
        }
        let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let frac = rank - lo as f64;
        Some(self.values[lo] + (self.values[hi] - self.values[lo]) * frac)
    }

    /// Cutoff for a signed metric judged by magnitude:
    /// max(P(p), -P(100 - p)). Non-decreasing in `p` for p >= 50.
    pub fn two_sided_percentile(&self, p: f64) -> Option<f64> {
        let upper = self.percentile(p)?;
        let lower = self.percentile(100.0 - p)?;
        Some(upper.max(-lower))
    }
}

/// Percentile of a metric grid, failing when it holds no finite values
pub fn metric_percentile(grid: &Raster<f64>, p: f64, metric: &'static str, two_sided: bool) -> Result<f64> {
    let sample = SortedSample::from_raster(grid);
    let value = if two_sided {
        sample.two_sided_percentile(p)
    } else {
        sample.percentile(p)
    };
    value.ok_or(Error::StatisticalDegeneracy { metric })
}
