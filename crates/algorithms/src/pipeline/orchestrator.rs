//! Stage sequencing
//!
//! ```text
//! Idle -> MetricsComputed -> Classified -> Buffered -> Filled
//!      -> Smoothed -> Interpolated -> Complete
//! ```
//!
//! Any stage error ends the run in `Failed`; a cancellation seen between
//! stages ends it in `Cancelled`. Partial outputs are dropped in both cases
//! and only the report is returned.

use std::time::Instant;

use tracing::{info, warn};
use bare_earth_core::raster::Raster;
use bare_earth_core::{Algorithm, Error, Result};

use crate::classification::{classify, derive_thresholds, Classification, MetricGrids};
use crate::interpolation::{gap_fill, interpolate_surface, SurfaceOptions};
use crate::morphology::buffer_mask;
use crate::terrain::{gaussian_smoothing, terrain_metrics, TerrainMetricsParams};
use crate::texture::{local_texture, TextureGrids, TextureSource};

use super::config::BareEarthConfig;
use super::progress::{CancellationToken, NoProgress, PipelineState, ProgressEvent, ProgressSink};
use super::report::{Failure, GapFillStats, InterpolationStats, RunReport};

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TerrainMetrics,
    TextureAnalysis,
    ThresholdEngine,
    Classifier,
    MaskBuffer,
    GapFiller,
    Smoother,
    Interpolator,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::TerrainMetrics => "terrain_metrics",
            Stage::TextureAnalysis => "texture_analysis",
            Stage::ThresholdEngine => "threshold_engine",
            Stage::Classifier => "classifier",
            Stage::MaskBuffer => "mask_buffer",
            Stage::GapFiller => "gap_filler",
            Stage::Smoother => "smoother",
            Stage::Interpolator => "interpolator",
        }
    }
}

/// Outputs of a completed run
#[derive(Debug, Clone)]
pub struct BareEarthProducts {
    pub bare_earth: Raster<f64>,
    /// Category codes per cell
    pub classification: Raster<u8>,
    /// Mask after buffering, 1 on removed cells
    pub buffered_mask: Raster<u8>,
    /// Present when `output.keep_metrics` is set
    pub metrics: Option<MetricGrids>,
    pub report: RunReport,
}

/// Terminal result of [`Pipeline::run`]
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Complete(Box<BareEarthProducts>),
    Cancelled(RunReport),
    Failed(RunReport),
}

impl RunOutcome {
    pub fn state(&self) -> PipelineState {
        self.report().state
    }

    pub fn report(&self) -> &RunReport {
        match self {
            RunOutcome::Complete(p) => &p.report,
            RunOutcome::Cancelled(r) | RunOutcome::Failed(r) => r,
        }
    }

    /// Products of a complete run, or an error naming why there are none
    pub fn into_products(self) -> Result<BareEarthProducts> {
        match self {
            RunOutcome::Complete(p) => Ok(*p),
            RunOutcome::Cancelled(_) => Err(Error::Algorithm("run was cancelled".into())),
            RunOutcome::Failed(r) => {
                let msg = r
                    .failure
                    .map(|f| format!("{} failed: {}", f.stage, f.message))
                    .unwrap_or_else(|| "run failed".into());
                Err(Error::Algorithm(msg))
            }
        }
    }
}

enum Interrupt {
    Cancelled,
    Failed(Stage, Error),
}

/// DSM to bare-earth pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: BareEarthConfig,
}

struct Run<'a> {
    sink: &'a dyn ProgressSink,
    token: &'a CancellationToken,
    report: RunReport,
    fraction: f64,
    next: Stage,
}

impl Run<'_> {
    fn stage<T>(&mut self, stage: Stage, f: impl FnOnce() -> Result<T>) -> std::result::Result<T, Interrupt> {
        self.next = stage;
        if self.token.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        let start = Instant::now();
        let out = f().map_err(|e| Interrupt::Failed(stage, e))?;
        let ms = start.elapsed().as_secs_f64() * 1000.0;
        info!("{} finished in {:.1} ms", stage.name(), ms);
        self.report.stage_timings_ms.insert(stage.name().to_string(), ms);
        Ok(out)
    }

    fn advance(&mut self, stage: Stage, state: PipelineState, message: String) {
        self.report.state = state;
        self.fraction = self.fraction.max(state.fraction());
        self.sink.report(&ProgressEvent {
            stage: stage.name(),
            state,
            fraction: self.fraction,
            message,
        });
    }
}

fn percent(count: usize, valid: usize) -> f64 {
    if valid == 0 { 0.0 } else { 100.0 * count as f64 / valid as f64 }
}

impl Pipeline {
    /// Validate the configuration; nothing runs on an invalid one
    pub fn new(config: BareEarthConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BareEarthConfig {
        &self.config
    }

    /// Run every stage on `dsm`.
    ///
    /// The DSM's no-data sentinel is treated as no-data throughout and
    /// carried on the outputs.
    pub fn run(&self, dsm: &Raster<f64>, sink: &dyn ProgressSink, token: &CancellationToken) -> RunOutcome {
        let started = Instant::now();
        let mut run = Run {
            sink,
            token,
            report: RunReport::new(dsm.rows(), dsm.cols(), dsm.cell_size()),
            fraction: 0.0,
            next: Stage::TerrainMetrics,
        };
        info!(
            "Bare-earth reconstruction on {} x {} grid, cell size {}",
            dsm.cols(),
            dsm.rows(),
            dsm.cell_size()
        );
        run.advance(Stage::TerrainMetrics, PipelineState::Idle, "Starting".into());
        if self.config.single_filter_without_texture() {
            warn!(
                "Category filter {:?} has no effect without texture analysis; every non-ground cell is masked",
                self.config.filters
            );
        }

        let result = self.execute_stages(dsm, &mut run);
        run.report.total_ms = started.elapsed().as_secs_f64() * 1000.0;

        match result {
            Ok(mut products) => {
                run.advance(Stage::Interpolator, PipelineState::Complete, "Bare earth ready".into());
                products.report = run.report;
                RunOutcome::Complete(Box::new(products))
            }
            Err(Interrupt::Cancelled) => {
                warn!("Run cancelled before {}", run.next.name());
                let stage = run.next;
                run.advance(stage, PipelineState::Cancelled, format!("Cancelled before {}", stage.name()));
                RunOutcome::Cancelled(run.report)
            }
            Err(Interrupt::Failed(stage, e)) => {
                warn!("{} failed: {}", stage.name(), e);
                run.report.failure = Some(Failure {
                    stage: stage.name().to_string(),
                    message: e.to_string(),
                });
                run.advance(stage, PipelineState::Failed, format!("{} failed: {}", stage.name(), e));
                RunOutcome::Failed(run.report)
            }
        }
    }

    fn execute_stages(&self, input: &Raster<f64>, run: &mut Run<'_>) -> std::result::Result<BareEarthProducts, Interrupt> {
        let cfg = &self.config;
        let dsm = input.with_nan_nodata();
        let sentinel = input.nodata().filter(|v| !v.is_nan());

        let terrain_params = TerrainMetricsParams {
            smoothing: cfg.smoothing.clone(),
            curvature_type: cfg.curvature_type,
        };
        let terrain = run.stage(Stage::TerrainMetrics, || terrain_metrics(&dsm, &terrain_params))?;
        let texture = match &cfg.texture {
            Some(tp) => {
                let source = match tp.source {
                    TextureSource::Baseline => &terrain.baseline,
                    TextureSource::Residual => &terrain.residual,
                };
                Some(run.stage(Stage::TextureAnalysis, || local_texture(source, tp))?)
            }
            None => None,
        };
        let metrics = MetricGrids::new(terrain, texture);
        run.advance(
            Stage::TerrainMetrics,
            PipelineState::MetricsComputed,
            if metrics.texture.is_some() {
                "Computed slope, curvature, residual and texture".into()
            } else {
                "Computed slope, curvature and residual".into()
            },
        );

        let thresholds = run.stage(Stage::ThresholdEngine, || {
            derive_thresholds(&metrics, &cfg.thresholds, cfg.texture.as_ref())
        })?;
        let Classification { classes, targets, stats, split } =
            run.stage(Stage::Classifier, || classify(&dsm, &metrics, &thresholds, cfg.filters))?;

        let valid = stats.valid_cells;
        run.report.masked_percent_before_buffer = Some(percent(stats.targeted, valid));
        let message = format!(
            "{} of {} cells non-ground ({:.1}%){}",
            stats.total_non_ground(),
            valid,
            stats.percent(stats.total_non_ground()),
            if split { ", split by texture" } else { "" }
        );
        run.report.thresholds = Some(thresholds);
        run.report.categories = Some(stats);
        run.advance(Stage::Classifier, PipelineState::Classified, message);

        let buffered = run.stage(Stage::MaskBuffer, || buffer_mask(&targets, cfg.buffer_distance))?;
        run.report.buffer_radius_cells = Some(buffered.radius_cells);
        run.report.masked_percent_after_buffer = Some(percent(buffered.masked_count, valid));
        run.advance(
            Stage::MaskBuffer,
            PipelineState::Buffered,
            format!(
                "Buffered by {} cells, {} cells masked",
                buffered.radius_cells, buffered.masked_count
            ),
        );

        let filled = run.stage(Stage::GapFiller, || gap_fill(&dsm, &buffered.mask, &cfg.gap_fill))?;
        run.report.gap_fill = Some(GapFillStats {
            iterations: filled.iterations,
            filled_cells: filled.filled_cells,
            unreachable_cells: filled.unreachable_cells,
        });
        run.advance(
            Stage::GapFiller,
            PipelineState::Filled,
            format!("Filled {} cells in {} iterations", filled.filled_cells, filled.iterations),
        );

        let smoothed = run.stage(Stage::Smoother, || gaussian_smoothing(&filled.surface, &cfg.smoothing))?;
        run.advance(Stage::Smoother, PipelineState::Smoothed, "Smoothed filled surface".into());

        let options = SurfaceOptions {
            fill_distance: cfg.gap_fill.max_distance,
            smooth_ground: cfg.smooth_ground,
        };
        let surface = run.stage(Stage::Interpolator, || {
            interpolate_surface(&dsm, &buffered.mask, &smoothed, &cfg.interpolation, options)
        })?;
        run.report.interpolation = Some(InterpolationStats {
            strategy: cfg.interpolation.name().to_string(),
            idw_cells: surface.idw_cells,
            passes_applied: surface.passes_applied,
            seam_simple: surface.seam_simple,
            seam_final: surface.seam_final,
        });
        run.report.unreachable_cells = surface.unreachable_cells;
        run.report.unreachable_warning = surface.unreachable_cells > 0;
        run.advance(
            Stage::Interpolator,
            PipelineState::Interpolated,
            format!("{} interpolation, seam {:.3}", cfg.interpolation.name(), surface.seam_final),
        );

        let carry = |mut r: Raster<f64>| {
            r.set_nodata(Some(sentinel.unwrap_or(f64::NAN)));
            r
        };
        let metrics = cfg.output.keep_metrics.then(|| MetricGrids {
            baseline: carry(metrics.baseline),
            slope: carry(metrics.slope),
            curvature: carry(metrics.curvature),
            residual: carry(metrics.residual),
            texture: metrics.texture.map(|t| TextureGrids {
                variance: carry(t.variance),
                entropy: carry(t.entropy),
            }),
        });

        Ok(BareEarthProducts {
            bare_earth: carry(surface.surface),
            classification: classes,
            buffered_mask: buffered.mask,
            metrics,
            // Replaced by the run's report once the terminal state is set
            report: RunReport::new(0, 0, 0.0),
        })
    }
}

/// The whole pipeline as one [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct BareEarthReconstruction;

impl Algorithm for BareEarthReconstruction {
    type Input = Raster<f64>;
    type Output = BareEarthProducts;
    type Params = BareEarthConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "BareEarthReconstruction"
    }

    fn description(&self) -> &'static str {
        "Remove buildings and vegetation from a DSM and interpolate the ground beneath"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        Pipeline::new(params)?
            .run(&input, &NoProgress, &CancellationToken::new())
            .into_products()
    }
}
