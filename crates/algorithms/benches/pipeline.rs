//! Benchmarks for the reconstruction stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use bare_earth_algorithms::interpolation::{gap_fill, GapFillParams};
use bare_earth_algorithms::morphology::buffer_mask;
use bare_earth_algorithms::pipeline::{BareEarthConfig, CancellationToken, NoProgress, Pipeline};
use bare_earth_algorithms::terrain::{gaussian_smoothing, GaussianSmoothingParams};
use bare_earth_core::{GeoTransform, Raster};

/// Gently tilted terrain with a grid of box-shaped buildings
fn create_dsm(size: usize) -> Raster<f64> {
    let mut dsm = Raster::new(size, size);
    dsm.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));

    for row in 0..size {
        for col in 0..size {
            let ground = 100.0 + 0.05 * (row + col) as f64;
            let building = (row % 40 < 12) && (col % 40 < 12);
            dsm.set(row, col, if building { ground + 8.0 } else { ground }).unwrap();
        }
    }
    dsm
}

fn building_mask(dsm: &Raster<f64>) -> Raster<u8> {
    let mut mask: Raster<u8> = dsm.with_same_meta(dsm.rows(), dsm.cols());
    for row in 0..dsm.rows() {
        for col in 0..dsm.cols() {
            if row % 40 < 12 && col % 40 < 12 {
                mask.set(row, col, 1).unwrap();
            }
        }
    }
    mask
}

fn bench_smoothing(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_smoothing");
    for size in [256, 512, 1024].iter() {
        let dsm = create_dsm(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| gaussian_smoothing(black_box(&dsm), &GaussianSmoothingParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_buffer_and_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_and_fill");
    for size in [256, 512].iter() {
        let dsm = create_dsm(*size);
        let mask = building_mask(&dsm);
        group.bench_with_input(BenchmarkId::new("buffer", size), size, |b, _| {
            b.iter(|| buffer_mask(black_box(&mask), 2.0).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("gap_fill", size), size, |b, _| {
            b.iter(|| gap_fill(black_box(&dsm), &mask, &GapFillParams::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let pipeline = Pipeline::new(BareEarthConfig::default()).unwrap();
    for size in [256, 512].iter() {
        let dsm = create_dsm(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| pipeline.run(black_box(&dsm), &NoProgress, &CancellationToken::new()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_smoothing, bench_buffer_and_fill, bench_pipeline);
criterion_main!(benches);
