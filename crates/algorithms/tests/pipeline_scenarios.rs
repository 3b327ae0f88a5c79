//! End-to-end runs of the reconstruction pipeline on synthetic surfaces.

use std::sync::Mutex;

use approx::assert_abs_diff_eq;
use bare_earth_algorithms::classification::{Category, FixedThresholds, MaskFilters, ThresholdMode, CLASS_NODATA};
use bare_earth_algorithms::interpolation::InterpolationStrategy;
use bare_earth_algorithms::pipeline::{
    BareEarthConfig, BareEarthProducts, BareEarthReconstruction, CancellationToken, NoProgress, Pipeline,
    PipelineState, ProgressEvent, RunOutcome,
};
use bare_earth_algorithms::texture::TextureParams;
use bare_earth_core::raster::Raster;
use bare_earth_core::{Algorithm, Error, GeoTransform, CRS};

fn surface(rows: usize, cols: usize, cell: f64, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
    let mut dsm: Raster<f64> = Raster::new(rows, cols);
    dsm.set_transform(GeoTransform::new(500_000.0, 6_300_000.0, cell, -cell));
    dsm.set_crs(Some(CRS::from_epsg(32719)));
    for r in 0..rows {
        for c in 0..cols {
            dsm.set(r, c, f(r, c)).unwrap();
        }
    }
    dsm
}

/// 21x21 plane at 50 m with a 3x3 block raised by 20 m
fn raised_block() -> Raster<f64> {
    surface(21, 21, 1.0, |r, c| {
        if (9..12).contains(&r) && (9..12).contains(&c) { 70.0 } else { 50.0 }
    })
}

fn complete(outcome: RunOutcome) -> BareEarthProducts {
    match outcome {
        RunOutcome::Complete(p) => *p,
        other => panic!("run did not complete: {:?}", other.report()),
    }
}

fn run(dsm: &Raster<f64>, config: BareEarthConfig) -> BareEarthProducts {
    let pipeline = Pipeline::new(config).unwrap();
    complete(pipeline.run(dsm, &NoProgress, &CancellationToken::new()))
}

fn codes(r: &Raster<u8>) -> Vec<u8> {
    r.data().iter().copied().collect()
}

#[test]
fn flat_surface_is_returned_unchanged() {
    let dsm = surface(10, 10, 1.0, |_, _| 100.0);
    let out = run(&dsm, BareEarthConfig::default());

    assert!(codes(&out.classification).iter().all(|&c| c == Category::Ground.code()));
    assert_eq!(out.bare_earth.data(), dsm.data());
    assert_eq!(out.report.state, PipelineState::Complete);
    assert_eq!(out.report.gap_fill.as_ref().unwrap().filled_cells, 0);
    assert!(!out.report.unreachable_warning);
}

#[test]
fn raised_block_is_replaced_by_surrounding_plane() {
    let dsm = raised_block();
    let config = BareEarthConfig {
        interpolation: InterpolationStrategy::Simple,
        ..Default::default()
    };
    let out = run(&dsm, config);

    for r in 9..12 {
        for c in 9..12 {
            assert_eq!(out.classification.get(r, c).unwrap(), Category::NonGround.code());
            assert_abs_diff_eq!(out.bare_earth.get(r, c).unwrap(), 50.0, epsilon = 1e-6);
        }
    }
    assert_abs_diff_eq!(out.bare_earth.get(0, 0).unwrap(), 50.0, epsilon = 1e-12);

    let report = &out.report;
    let thresholds = report.thresholds.as_ref().unwrap();
    assert!(thresholds.residual < 10.0, "residual cutoff {}", thresholds.residual);
    assert!(report.masked_percent_after_buffer.unwrap() >= report.masked_percent_before_buffer.unwrap());
    assert_eq!(report.buffer_radius_cells, Some(1));
    assert_eq!(report.unreachable_cells, 0);
}

#[test]
fn enhanced_seam_is_not_worse_than_simple() {
    let dsm = raised_block();
    let simple = run(&dsm, BareEarthConfig { interpolation: InterpolationStrategy::Simple, ..Default::default() });
    let enhanced = run(&dsm, BareEarthConfig::default());

    let s = simple.report.interpolation.unwrap();
    let e = enhanced.report.interpolation.unwrap();
    assert_eq!(e.strategy, "enhanced");
    assert!(e.seam_final <= s.seam_final + 1e-12);
}

#[test]
fn no_filters_gives_binary_classification() {
    let dsm = raised_block();
    let config = BareEarthConfig {
        texture: Some(TextureParams::default()),
        filters: MaskFilters { anthropogenic: false, vegetation: false },
        ..Default::default()
    };
    let out = run(&dsm, config);
    let classes = codes(&out.classification);
    assert!(classes.iter().all(|&c| c == 0 || c == 3));
    assert!(classes.contains(&3));

    let split = run(&dsm, BareEarthConfig {
        texture: Some(TextureParams::default()),
        filters: MaskFilters { anthropogenic: true, vegetation: true },
        ..Default::default()
    });
    let classes = codes(&split.classification);
    assert!(!classes.contains(&3));
    assert!(classes.iter().any(|&c| c == 1 || c == 2));
}

#[test]
fn fixed_thresholds_mask_steep_ramp() {
    let rise = 20.0_f64.to_radians().tan();
    let dsm = surface(20, 50, 1.0, |_, c| rise * (c.clamp(10, 40) - 10) as f64);
    let config = BareEarthConfig {
        thresholds: ThresholdMode::Fixed(FixedThresholds::default()),
        ..Default::default()
    };
    let out = run(&dsm, config);

    // The pre-filter rounds the two kinks at columns 10 and 40
    for r in 0..20 {
        for c in 13..=37 {
            assert_ne!(
                out.classification.get(r, c).unwrap(),
                Category::Ground.code(),
                "ramp cell ({}, {}) kept as ground",
                r,
                c
            );
            assert_eq!(out.buffered_mask.get(r, c).unwrap(), 1);
        }
    }
}

#[test]
fn fixed_thresholds_mask_ramp_reaching_the_grid_edge() {
    let rise = 20.0_f64.to_radians().tan();
    let dsm = surface(20, 20, 1.0, |_, c| rise * c as f64);
    let config = BareEarthConfig {
        thresholds: ThresholdMode::Fixed(FixedThresholds::default()),
        buffer_distance: 0.0,
        interpolation: InterpolationStrategy::Simple,
        ..Default::default()
    };
    let out = run(&dsm, config);

    assert!(codes(&out.classification).iter().all(|&c| c == Category::NonGround.code()));
    assert!(codes(&out.buffered_mask).iter().all(|&c| c == 1));
    // Nothing is left to fill from
    assert_eq!(out.report.unreachable_cells, 400);
    assert!(out.report.unreachable_warning);

    let m = bare_earth_algorithms::terrain::terrain_metrics(
        &dsm,
        &bare_earth_algorithms::terrain::TerrainMetricsParams::default(),
    )
    .unwrap();
    for c in 0..20 {
        assert_abs_diff_eq!(m.slope.get(0, c).unwrap(), 20.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m.slope.get(19, c).unwrap(), 20.0, epsilon = 1e-6);
    }
}

#[test]
fn fixed_thresholds_keep_gentle_plane() {
    let rise = 5.0_f64.to_radians().tan();
    let dsm = surface(30, 30, 1.0, |r, c| 200.0 + rise * c as f64 + 0.01 * r as f64);
    let config = BareEarthConfig {
        thresholds: ThresholdMode::Fixed(FixedThresholds {
            slope_degrees: 15.0,
            curvature: 0.5,
            residual: 2.0,
        }),
        ..Default::default()
    };
    let out = run(&dsm, config);
    assert!(codes(&out.classification).iter().all(|&c| c == Category::Ground.code()));
    assert_eq!(out.bare_earth.data(), dsm.data());
}

#[test]
fn nodata_propagates_and_georeferencing_is_kept() {
    let mut dsm = raised_block();
    dsm.set_nodata(Some(-9999.0));
    dsm.set(0, 0, -9999.0).unwrap();
    dsm.set(20, 5, -9999.0).unwrap();

    let config = BareEarthConfig {
        output: bare_earth_algorithms::pipeline::OutputOptions { keep_metrics: true, ..Default::default() },
        ..Default::default()
    };
    let out = run(&dsm, config);

    assert!(out.bare_earth.same_grid(&dsm));
    assert!(out.classification.same_grid(&dsm));
    assert!(out.buffered_mask.same_grid(&dsm));
    assert_eq!(out.bare_earth.nodata(), Some(-9999.0));

    for &(r, c) in &[(0, 0), (20, 5)] {
        assert!(out.bare_earth.is_nodata_at(r, c).unwrap());
        assert_eq!(out.classification.get(r, c).unwrap(), CLASS_NODATA);
        assert_eq!(out.buffered_mask.get(r, c).unwrap(), CLASS_NODATA);
        let m = out.metrics.as_ref().unwrap();
        assert!(m.slope.get(r, c).unwrap().is_nan());
        assert!(m.residual.get(r, c).unwrap().is_nan());
    }
    assert_eq!(out.bare_earth.valid_count(), 21 * 21 - 2);
}

#[test]
fn unreachable_cells_are_reported() {
    let dsm = raised_block();
    let mut config = BareEarthConfig {
        buffer_distance: 3.0,
        interpolation: InterpolationStrategy::Simple,
        ..Default::default()
    };
    config.gap_fill.max_distance = 1;
    let out = run(&dsm, config);

    let report = &out.report;
    assert!(report.unreachable_warning);
    assert!(report.unreachable_cells > 0);
    let empty = out.bare_earth.data().iter().filter(|v| v.is_nan()).count();
    assert_eq!(empty, report.unreachable_cells);
    assert_eq!(report.state, PipelineState::Complete);
}

#[test]
fn progress_is_monotone_and_ordered() {
    let events = Mutex::new(Vec::<ProgressEvent>::new());
    let sink = |e: &ProgressEvent| events.lock().unwrap().push(e.clone());
    let pipeline = Pipeline::new(BareEarthConfig::default()).unwrap();
    let outcome = pipeline.run(&raised_block(), &sink, &CancellationToken::new());
    assert_eq!(outcome.state(), PipelineState::Complete);

    let events = events.into_inner().unwrap();
    assert!(events.windows(2).all(|w| w[0].fraction <= w[1].fraction));
    let states: Vec<PipelineState> = events.iter().map(|e| e.state).collect();
    assert_eq!(
        states,
        vec![
            PipelineState::Idle,
            PipelineState::MetricsComputed,
            PipelineState::Classified,
            PipelineState::Buffered,
            PipelineState::Filled,
            PipelineState::Smoothed,
            PipelineState::Interpolated,
            PipelineState::Complete,
        ]
    );
    assert_eq!(events.last().unwrap().fraction, 100.0);
    assert!(events.iter().all(|e| !e.message.is_empty()));

    let timings = &outcome.report().stage_timings_ms;
    for stage in ["terrain_metrics", "threshold_engine", "classifier", "mask_buffer", "gap_filler", "smoother", "interpolator"] {
        assert!(timings.contains_key(stage), "missing timing for {}", stage);
    }
}

#[test]
fn cancellation_between_stages() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let sink = move |e: &ProgressEvent| {
        if e.state == PipelineState::MetricsComputed {
            trigger.cancel();
        }
    };
    let pipeline = Pipeline::new(BareEarthConfig::default()).unwrap();
    let outcome = pipeline.run(&raised_block(), &sink, &token);

    let RunOutcome::Cancelled(report) = outcome else {
        panic!("expected a cancelled run");
    };
    assert_eq!(report.state, PipelineState::Cancelled);
    assert!(report.thresholds.is_none());
    assert!(report.failure.is_none());

    let early = CancellationToken::new();
    early.cancel();
    assert_eq!(pipeline.run(&raised_block(), &NoProgress, &early).state(), PipelineState::Cancelled);
}

#[test]
fn all_nodata_input_fails_at_terrain_metrics() {
    let dsm = surface(5, 5, 1.0, |_, _| f64::NAN);
    let pipeline = Pipeline::new(BareEarthConfig::default()).unwrap();
    let outcome = pipeline.run(&dsm, &NoProgress, &CancellationToken::new());

    let RunOutcome::Failed(report) = outcome else {
        panic!("expected a failed run");
    };
    assert_eq!(report.state, PipelineState::Failed);
    assert_eq!(report.failure.unwrap().stage, "terrain_metrics");
}

#[test]
fn invalid_configuration_is_rejected_up_front() {
    let config = BareEarthConfig {
        thresholds: ThresholdMode::Percentile(bare_earth_algorithms::classification::PercentileSet {
            slope: 45.0,
            ..Default::default()
        }),
        ..Default::default()
    };
    assert!(matches!(
        Pipeline::new(config),
        Err(Error::InvalidParameter { name: "slope_percentile", .. })
    ));
}

#[test]
fn higher_percentile_never_masks_more() {
    let dsm = surface(25, 25, 1.0, |r, c| {
        let (x, y) = (c as f64, r as f64);
        10.0 + 0.3 * x + 2.0 * (x * 0.7).sin() * (y * 0.5).cos()
    });
    let masked = |p: f64| {
        let config = BareEarthConfig {
            thresholds: ThresholdMode::Percentile(bare_earth_algorithms::classification::PercentileSet {
                slope: p,
                curvature: 99.0,
                residual: 99.0,
                ..Default::default()
            }),
            buffer_distance: 0.0,
            ..Default::default()
        };
        let out = run(&dsm, config);
        (out.report.thresholds.unwrap().slope, out.report.categories.unwrap().targeted)
    };
    let (t90, n90) = masked(90.0);
    let (t95, n95) = masked(95.0);
    assert!(t95 >= t90);
    assert!(n95 <= n90);
}

#[test]
fn pipeline_as_algorithm() {
    let out = BareEarthReconstruction.execute_default(raised_block()).unwrap();
    assert_eq!(out.report.state, PipelineState::Complete);
    assert!(out.metrics.is_none());
}
