//! bare-earth CLI - DSM to bare-earth reconstruction

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use bare_earth_algorithms::classification::{FixedThresholds, MaskFilters, PercentileSet, ThresholdMode};
use bare_earth_algorithms::interpolation::{EnhancedParams, InterpolationStrategy};
use bare_earth_algorithms::pipeline::{
    BareEarthConfig, BareEarthProducts, CancellationToken, Pipeline, ProgressEvent, ProgressSink, RunOutcome,
};
use bare_earth_algorithms::terrain::CurvatureType;
use bare_earth_algorithms::texture::TextureParams;
use bare_earth_core::io::{read_geotiff, write_geotiff, write_mask_geotiff, GeoTiffOptions};
use bare_earth_core::Raster;

const REPORT_FILE: &str = "reconstruction_report.json";
const INTERMEDIATE_DIR: &str = "intermediate";

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "bare-earth")]
#[command(author, version, about = "Reconstruct bare-earth terrain from a DSM", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Remove non-ground features from a DSM
    Run {
        /// Input DSM file
        input: PathBuf,
        /// Output directory
        output: PathBuf,
        #[command(flatten)]
        options: RunOptions,
    },
    /// Print the default configuration as JSON
    DefaultConfig,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Percentile,
    Fixed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Simple,
    Enhanced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum CurvatureArg {
    General,
    Profile,
    Plan,
}

/// Options of `run`; flags override values from `--config`
#[derive(Args, Debug, Default)]
struct RunOptions {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Scale sigma, kernel radius and fill distance to the DSM cell size
    #[arg(long)]
    auto_scale: bool,

    /// Threshold mode
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,
    /// Slope percentile (percentile mode)
    #[arg(long)]
    slope_percentile: Option<f64>,
    /// Curvature percentile (percentile mode)
    #[arg(long)]
    curvature_percentile: Option<f64>,
    /// Residual percentile (percentile mode)
    #[arg(long)]
    residual_percentile: Option<f64>,
    /// Variance percentile (percentile mode)
    #[arg(long)]
    variance_percentile: Option<f64>,
    /// Entropy percentile (percentile mode)
    #[arg(long)]
    entropy_percentile: Option<f64>,
    /// Slope cutoff in degrees (fixed mode)
    #[arg(long)]
    slope_threshold: Option<f64>,
    /// Curvature magnitude cutoff (fixed mode)
    #[arg(long)]
    curvature_threshold: Option<f64>,
    /// Residual cutoff in elevation units (fixed mode)
    #[arg(long)]
    residual_threshold: Option<f64>,
    /// Curvature type
    #[arg(long, value_enum)]
    curvature_type: Option<CurvatureArg>,

    /// Gaussian sigma in cells
    #[arg(long)]
    sigma: Option<f64>,
    /// Gaussian kernel radius in cells
    #[arg(long)]
    kernel_radius: Option<usize>,
    /// Smoothing iterations
    #[arg(long)]
    smoothing_iterations: Option<usize>,

    /// Enable texture analysis
    #[arg(long)]
    texture: bool,
    /// Texture window size (odd, 3 to 9)
    #[arg(long)]
    texture_window: Option<usize>,
    /// Variance cutoff (fixed mode)
    #[arg(long)]
    variance_threshold: Option<f64>,
    /// Entropy cutoff in bits (fixed mode)
    #[arg(long)]
    entropy_threshold: Option<f64>,

    /// Mask vegetation
    #[arg(long)]
    filter_vegetation: Option<bool>,
    /// Mask anthropogenic features
    #[arg(long)]
    filter_anthropogenic: Option<bool>,
    /// Buffer distance in map units
    #[arg(long)]
    buffer: Option<f64>,
    /// Maximum fill distance in cells
    #[arg(long)]
    fill_distance: Option<usize>,
    /// Maximum fill iterations
    #[arg(long)]
    fill_iterations: Option<usize>,
    /// Interpolation strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Do not write the JSON report
    #[arg(long)]
    no_report: bool,
    /// Keep every raster in the output directory
    #[arg(long)]
    flat: bool,
    /// Also write slope, curvature, residual, baseline and texture grids
    #[arg(long)]
    keep_metrics: bool,
}

// ─── Configuration ──────────────────────────────────────────────────────

fn load_config(options: &RunOptions) -> Result<BareEarthConfig> {
    let mut config = match &options.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => BareEarthConfig::default(),
    };
    apply_overrides(&mut config, options);
    Ok(config)
}

fn apply_overrides(config: &mut BareEarthConfig, o: &RunOptions) {
    match o.mode {
        Some(ModeArg::Percentile) if !matches!(config.thresholds, ThresholdMode::Percentile(_)) => {
            config.thresholds = ThresholdMode::Percentile(PercentileSet::default());
        }
        Some(ModeArg::Fixed) if !matches!(config.thresholds, ThresholdMode::Fixed(_)) => {
            config.thresholds = ThresholdMode::Fixed(FixedThresholds::default());
        }
        _ => {}
    }
    match &mut config.thresholds {
        ThresholdMode::Percentile(p) => {
            set(&mut p.slope, o.slope_percentile);
            set(&mut p.curvature, o.curvature_percentile);
            set(&mut p.residual, o.residual_percentile);
            set(&mut p.variance, o.variance_percentile);
            set(&mut p.entropy, o.entropy_percentile);
        }
        ThresholdMode::Fixed(f) => {
            set(&mut f.slope_degrees, o.slope_threshold);
            set(&mut f.curvature, o.curvature_threshold);
            set(&mut f.residual, o.residual_threshold);
        }
    }
    if let Some(c) = o.curvature_type {
        config.curvature_type = match c {
            CurvatureArg::General => CurvatureType::General,
            CurvatureArg::Profile => CurvatureType::Profile,
            CurvatureArg::Plan => CurvatureType::Plan,
        };
    }

    set(&mut config.smoothing.sigma, o.sigma);
    set(&mut config.smoothing.radius, o.kernel_radius);
    set(&mut config.smoothing.iterations, o.smoothing_iterations);

    let texture_flags = o.texture_window.is_some() || o.variance_threshold.is_some() || o.entropy_threshold.is_some();
    if o.texture || texture_flags {
        let t = config.texture.get_or_insert_with(TextureParams::default);
        set(&mut t.window_size, o.texture_window);
        set(&mut t.variance_threshold, o.variance_threshold);
        set(&mut t.entropy_threshold, o.entropy_threshold);
    }

    let MaskFilters { anthropogenic, vegetation } = &mut config.filters;
    set(anthropogenic, o.filter_anthropogenic);
    set(vegetation, o.filter_vegetation);
    set(&mut config.buffer_distance, o.buffer);
    set(&mut config.gap_fill.max_distance, o.fill_distance);
    set(&mut config.gap_fill.max_iterations, o.fill_iterations);

    match o.strategy {
        Some(StrategyArg::Simple) => config.interpolation = InterpolationStrategy::Simple,
        Some(StrategyArg::Enhanced) if config.interpolation == InterpolationStrategy::Simple => {
            config.interpolation = InterpolationStrategy::Enhanced(EnhancedParams::default());
        }
        _ => {}
    }

    if o.no_report {
        config.output.write_report = false;
    }
    if o.flat {
        config.output.organize_files = false;
    }
    if o.keep_metrics {
        config.output.keep_metrics = true;
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(v) = value {
        *target = v;
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a global tracing subscriber was already set");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Progress bar fed by pipeline events
struct BarSink(ProgressBar);

impl BarSink {
    fn new() -> Self {
        let pb = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::default_bar().template("{bar:40.cyan/blue} {pos:>3}% {msg}") {
            pb.set_style(style);
        }
        Self(pb)
    }
}

impl ProgressSink for BarSink {
    fn report(&self, event: &ProgressEvent) {
        self.0.set_position(event.fraction.round() as u64);
        self.0.set_message(event.message.clone());
    }
}

fn read_dem(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path).context("Failed to read raster")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    write_geotiff(raster, path, Some(GeoTiffOptions::default()))
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn write_mask(raster: &Raster<u8>, path: &Path) -> Result<()> {
    write_mask_geotiff(raster, path).with_context(|| format!("Failed to write {}", path.display()))
}

/// Write the products of a completed run, returning the paths written
fn write_products(products: &BareEarthProducts, output: &Path, config: &BareEarthConfig) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output).with_context(|| format!("Failed to create {}", output.display()))?;
    let intermediate = if config.output.organize_files {
        let dir = output.join(INTERMEDIATE_DIR);
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        dir
    } else {
        output.to_path_buf()
    };

    let pb = spinner("Writing outputs...");
    let mut written = Vec::new();

    let path = output.join("bare_earth.tif");
    write_result(&products.bare_earth, &path)?;
    written.push(path);

    let path = output.join("classification.tif");
    write_mask(&products.classification, &path)?;
    written.push(path);

    let path = intermediate.join("buffered_mask.tif");
    write_mask(&products.buffered_mask, &path)?;
    written.push(path);

    if let Some(m) = &products.metrics {
        let mut grids = vec![
            ("baseline.tif", &m.baseline),
            ("slope.tif", &m.slope),
            ("curvature.tif", &m.curvature),
            ("residual.tif", &m.residual),
        ];
        if let Some(t) = &m.texture {
            grids.push(("texture_variance.tif", &t.variance));
            grids.push(("texture_entropy.tif", &t.entropy));
        }
        for (name, grid) in grids {
            let path = intermediate.join(name);
            write_result(grid, &path)?;
            written.push(path);
        }
    }

    if config.output.write_report {
        let path = output.join(REPORT_FILE);
        let json = products.report.to_json().context("Failed to serialize report")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    pb.finish_and_clear();
    Ok(written)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_info(input: &Path) -> Result<()> {
    let raster = read_dem(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    if let Some(sd) = stats.std_dev {
        println!("  Std dev: {:.4}", sd);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
    );
    Ok(())
}

fn run(input: &Path, output: &Path, options: &RunOptions) -> Result<()> {
    let dem = read_dem(input)?;
    let mut config = load_config(options)?;
    if options.auto_scale {
        config = config.auto_scaled(dem.cell_size()).context("Failed to scale parameters")?;
        info!(
            "Auto-scaled to cell size {}: sigma {:.2}, kernel radius {}, fill distance {}",
            dem.cell_size(),
            config.smoothing.sigma,
            config.smoothing.radius,
            config.gap_fill.max_distance
        );
    }
    let pipeline = Pipeline::new(config).context("Invalid configuration")?;

    let start = Instant::now();
    let sink = BarSink::new();
    let outcome = pipeline.run(&dem, &sink, &CancellationToken::new());
    sink.0.finish_and_clear();
    let elapsed = start.elapsed();

    let products = match outcome {
        RunOutcome::Complete(products) => products,
        RunOutcome::Cancelled(_) => bail!("Run cancelled"),
        RunOutcome::Failed(report) => match report.failure {
            Some(f) => bail!("Stage {} failed: {}", f.stage, f.message),
            None => bail!("Run failed"),
        },
    };

    let report = &products.report;
    if report.unreachable_warning {
        warn!(
            "{} masked cells could not be reached and were left as no-data",
            report.unreachable_cells
        );
    }
    if let Some(stats) = &report.categories {
        println!(
            "Non-ground: {:.1}% (vegetation {:.1}%, anthropogenic {:.1}%)",
            stats.percent(stats.total_non_ground()),
            stats.percent(stats.vegetation),
            stats.percent(stats.anthropogenic)
        );
    }
    if let Some(pct) = report.masked_percent_after_buffer {
        println!("Masked after buffering: {:.1}%", pct);
    }

    let written = write_products(&products, output, pipeline.config())?;
    for path in &written[1..] {
        info!("Wrote {}", path.display());
    }
    done("Bare earth", &written[0], elapsed);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { input } => print_info(&input)?,
        Commands::Run { input, output, options } => run(&input, &output, &options)?,
        Commands::DefaultConfig => {
            let json = serde_json::to_string_pretty(&BareEarthConfig::default())
                .context("Failed to serialize configuration")?;
            println!("{}", json);
        }
    }

    Ok(())
}
