//! # Bare Earth Algorithms
//!
//! Stages of the DSM to bare-earth reconstruction and the orchestrator that
//! sequences them.
//!
//! ## Modules
//!
//! - **terrain**: slope, curvature, Gaussian smoother, residual
//! - **texture**: windowed variance and entropy
//! - **statistics**: percentiles over metric grids
//! - **classification**: threshold engine and per-cell classifier
//! - **morphology**: mask buffering by disk dilation
//! - **interpolation**: gap filler, IDW, final surface interpolation
//! - **pipeline**: configuration, progress, run report, orchestrator

pub mod classification;
pub mod interpolation;
mod maybe_rayon;
pub mod morphology;
pub mod pipeline;
pub mod statistics;
pub mod terrain;
pub mod texture;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classification::{
        classify, derive_thresholds, Category, Classification, MaskFilters, MetricGrids,
        ThresholdMode, ThresholdSet,
    };
    pub use crate::interpolation::{
        gap_fill, interpolate_surface, GapFillParams, InterpolationStrategy,
    };
    pub use crate::morphology::{buffer_mask, BufferedMask};
    pub use crate::pipeline::{
        BareEarthConfig, BareEarthProducts, CancellationToken, NoProgress, Pipeline,
        PipelineState, ProgressEvent, ProgressSink, RunOutcome, RunReport,
    };
    pub use crate::terrain::{
        curvature, gaussian_smoothing, slope, CurvatureType, GaussianSmoothingParams,
        SigmaSchedule,
    };
    pub use crate::texture::{local_texture, TextureParams, TextureSource};
    pub use bare_earth_core::prelude::*;
}
