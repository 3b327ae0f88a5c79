//! Reconstruction of the ground surface under masked cells
//!
//! - **gap_fill**: bounded, double-buffered frontier fill from known cells
//! - **idw**: Inverse Distance Weighting for cells the frontier missed
//! - **kdtree**: spatial index over ground samples
//! - **surface**: simple and enhanced final surface interpolation

mod gap_fill;
mod idw;
pub mod kdtree;
mod surface;

pub use gap_fill::{gap_fill, GapFillInput, GapFillParams, GapFillResult, GapFiller};
pub use idw::{idw_fill, IdwInterpolator, IdwParams};
pub use kdtree::{KdTree, NearestResult};
pub use surface::{
    interpolate_surface, seam_discontinuity, EnhancedParams, InterpolationStrategy, SurfaceOptions,
    SurfaceResult,
};

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to (x, y)
    #[inline]
    pub fn dist_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}
