//! Pipeline orchestration
//!
//! - **config**: run configuration and resolution auto-scaling
//! - **progress**: progress sink, pipeline states, cancellation token
//! - **report**: run report
//! - **orchestrator**: stage sequencing

mod config;
mod orchestrator;
mod progress;
mod report;

pub use config::{BareEarthConfig, OutputOptions, ScaledParameters};
pub use orchestrator::{BareEarthProducts, BareEarthReconstruction, Pipeline, RunOutcome, Stage};
pub use progress::{CancellationToken, NoProgress, PipelineState, ProgressEvent, ProgressSink};
pub use report::{Failure, GapFillStats, InterpolationStats, RunReport};
