//! Run report

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use bare_earth_core::{Error, Result};

use crate::classification::{CategoryStats, ThresholdSet};
use super::progress::PipelineState;

/// Gap filler statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapFillStats {
    pub iterations: usize,
    pub filled_cells: usize,
    pub unreachable_cells: usize,
}

/// Interpolator statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterpolationStats {
    pub strategy: String,
    pub idw_cells: usize,
    pub passes_applied: usize,
    pub seam_simple: f64,
    pub seam_final: f64,
}

/// Stage and message of a failed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub stage: String,
    pub message: String,
}

/// Summary of one run, filled in as stages complete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub state: PipelineState,
    pub rows: usize,
    pub cols: usize,
    pub cell_size: f64,
    pub thresholds: Option<ThresholdSet>,
    pub categories: Option<CategoryStats>,
    /// Target cells, percent of valid cells, before buffering
    pub masked_percent_before_buffer: Option<f64>,
    pub masked_percent_after_buffer: Option<f64>,
    pub buffer_radius_cells: Option<usize>,
    pub gap_fill: Option<GapFillStats>,
    pub interpolation: Option<InterpolationStats>,
    /// Masked cells left without a value
    pub unreachable_cells: usize,
    pub unreachable_warning: bool,
    /// Wall time per stage, milliseconds
    pub stage_timings_ms: BTreeMap<String, f64>,
    pub total_ms: f64,
    pub failure: Option<Failure>,
}

impl RunReport {
    pub fn new(rows: usize, cols: usize, cell_size: f64) -> Self {
        Self {
            state: PipelineState::Idle,
            rows,
            cols,
            cell_size,
            thresholds: None,
            categories: None,
            masked_percent_before_buffer: None,
            masked_percent_after_buffer: None,
            buffer_radius_cells: None,
            gap_fill: None,
            interpolation: None,
            unreachable_cells: 0,
            unreachable_warning: false,
            stage_timings_ms: BTreeMap::new(),
            total_ms: 0.0,
            failure: None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let mut r = RunReport::new(3, 4, 0.5);
        r.state = PipelineState::Failed;
        r.stage_timings_ms.insert("terrain_metrics".into(), 1.25);
        r.failure = Some(Failure { stage: "threshold_engine".into(), message: "no data".into() });

        let json = r.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["state"], "failed");
        assert_eq!(value["failure"]["stage"], "threshold_engine");
        assert_eq!(value["stage_timings_ms"]["terrain_metrics"], 1.25);

        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
