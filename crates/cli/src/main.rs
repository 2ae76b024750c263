//! Gridder CLI - Scattered point interpolation onto regular grids

mod io;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use gridder_algorithms::interpolation::{
    DataMetric, GridAlgorithm, GridConfig, GridContext, InverseDistanceNearestParams,
    InverseDistanceParams, LinearParams, MetricParams, MovingAverageParams, NearestParams,
    PointSet, ALGORITHM_NAMES,
};
use gridder_algorithms::prelude::{GridStatus, ThreadCount};
use gridder_core::{GridExtent, Raster, RasterElement};

use crate::io::{read_xyz, write_ascii_grid};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "gridder")]
#[command(author, version, about = "Grid scattered x,y,z samples", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a point file
    Info {
        /// Input x,y,z file
        input: PathBuf,
    },
    /// List the available algorithms
    Algorithms,
    /// Inverse distance to a power
    Invdist {
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        ellipse: EllipseArgs,
        /// Weighting power
        #[arg(long, default_value = "2.0")]
        power: f64,
        /// Smoothing added to every distance
        #[arg(long, default_value = "0.0")]
        smoothing: f64,
        /// Stop after this many samples, 0 for no limit
        #[arg(long, default_value = "0")]
        max_points: usize,
        /// Fewer samples than this give nodata
        #[arg(long, default_value = "0")]
        min_points: usize,
    },
    /// Inverse distance to a power over the nearest samples
    Invdistnn {
        #[command(flatten)]
        grid: GridArgs,
        /// Weighting power
        #[arg(long, default_value = "2.0")]
        power: f64,
        /// Smoothing added to every distance
        #[arg(long, default_value = "0.0")]
        smoothing: f64,
        /// Search radius
        #[arg(long, default_value = "1.0")]
        radius: f64,
        /// Closest samples used, 0 for all within the radius
        #[arg(long, default_value = "12")]
        max_points: usize,
        /// Fewer samples than this give nodata
        #[arg(long, default_value = "0")]
        min_points: usize,
    },
    /// Moving average
    Average {
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        ellipse: EllipseArgs,
        /// Fewer samples than this give nodata
        #[arg(long, default_value = "0")]
        min_points: usize,
    },
    /// Nearest neighbour
    Nearest {
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        ellipse: EllipseArgs,
    },
    /// Data metric over the search ellipse
    Metric {
        /// minimum, maximum, range, count, average_distance, average_distance_pts
        metric: String,
        #[command(flatten)]
        grid: GridArgs,
        #[command(flatten)]
        ellipse: EllipseArgs,
        /// Fewer samples than this give nodata
        #[arg(long, default_value = "0")]
        min_points: usize,
    },
    /// Linear interpolation over a Delaunay triangulation
    Linear {
        #[command(flatten)]
        grid: GridArgs,
        /// Outside the triangulation: negative for the nearest sample,
        /// 0 for nodata, positive for the nearest sample within this distance
        #[arg(long, default_value = "-1.0", allow_hyphen_values = true)]
        radius: f64,
    },
}

/// Input, output and grid geometry shared by every algorithm
#[derive(Args)]
struct GridArgs {
    /// Input x,y,z file
    input: PathBuf,
    /// Output ESRI ASCII grid
    output: PathBuf,
    /// X extent, defaults to the samples' bounds
    #[arg(long, num_args = 2, value_names = ["XMIN", "XMAX"], allow_hyphen_values = true)]
    txe: Option<Vec<f64>>,
    /// Y extent, defaults to the samples' bounds
    #[arg(long, num_args = 2, value_names = ["YMIN", "YMAX"], allow_hyphen_values = true)]
    tye: Option<Vec<f64>>,
    /// Output size in columns and rows
    #[arg(long, num_args = 2, value_names = ["COLS", "ROWS"], default_values_t = [256, 256])]
    outsize: Vec<usize>,
    /// Output pixel type
    #[arg(long = "ot", value_enum, default_value = "float32")]
    output_type: OutputType,
    /// Value for nodes without a usable neighbourhood
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    nodata: f64,
    /// Worker threads: a number or ALL_CPUS
    #[arg(short, long, default_value = "ALL_CPUS")]
    threads: ThreadCount,
    /// Build a spatial index above this many samples
    #[arg(long, default_value = "100")]
    index_threshold: usize,
    /// Disable the packed inverse distance kernel
    #[arg(long)]
    no_simd: bool,
}

/// Search ellipse shared by the ellipse-based algorithms
#[derive(Args)]
struct EllipseArgs {
    /// First semi-axis, 0 for no limit
    #[arg(long, default_value = "0.0")]
    radius1: f64,
    /// Second semi-axis, 0 for no limit
    #[arg(long, default_value = "0.0")]
    radius2: f64,
    /// Counter-clockwise rotation of the ellipse in degrees
    #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
    angle: f64,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputType {
    Byte,
    Int16,
    #[value(name = "uint16")]
    UInt16,
    Int32,
    Float32,
    Float64,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress_bar(rows: usize) -> ProgressBar {
    let pb = ProgressBar::new(rows as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({eta})")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}

fn read_points(path: &PathBuf) -> Result<PointSet<'static>> {
    let pb = spinner("Reading points...");
    let points = read_xyz(path).context("Failed to read points")?;
    pb.finish_and_clear();
    info!("Input: {} points", points.len());
    Ok(points)
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_metric(s: &str) -> Result<DataMetric> {
    DataMetric::ALL
        .into_iter()
        .find(|m| m.name() == s.to_lowercase())
        .with_context(|| {
            let names: Vec<&str> = DataMetric::ALL.iter().map(|m| m.name()).collect();
            format!("Unknown metric: {}. Use one of {}.", s, names.join(", "))
        })
}

impl GridArgs {
    fn extent(&self, points: &PointSet<'_>) -> Result<GridExtent> {
        let bounds = points.bounds();
        let (x_min, x_max) = match self.txe.as_deref() {
            Some([a, b]) => (*a, *b),
            _ => (bounds.min_x, bounds.max_x),
        };
        let (y_min, y_max) = match self.tye.as_deref() {
            Some([a, b]) => (*a, *b),
            _ => (bounds.min_y, bounds.max_y),
        };
        let extent = GridExtent::new(x_min, x_max, y_min, y_max, self.outsize[0], self.outsize[1]);
        extent.validate().context("Invalid output grid")?;
        Ok(extent)
    }

    fn config(&self) -> GridConfig {
        GridConfig {
            threads: self.threads,
            index_threshold: self.index_threshold,
            use_avx: !self.no_simd,
            use_sse: !self.no_simd,
            ..Default::default()
        }
    }
}

/// Evaluate `ctx` over `extent` into a raster of `T`, with a progress bar.
fn evaluate<T>(ctx: &GridContext<'_>, extent: &GridExtent) -> Result<Option<Raster<T>>>
where
    T: RasterElement,
{
    let mut data = vec![T::zero(); extent.len()];
    let pb = progress_bar(extent.rows);
    let rows = extent.rows as f64;
    let status = ctx
        .evaluate(extent, &mut data, |fraction, _| {
            pb.set_position((fraction * rows).round() as u64);
            true
        })
        .context("Failed to evaluate grid")?;
    pb.finish_and_clear();

    if status == GridStatus::Cancelled {
        warn!("Evaluation cancelled");
        return Ok(None);
    }
    let mut raster = Raster::from_vec(data, extent.rows, extent.cols)?;
    raster.set_transform(extent.transform());
    raster.set_nodata(Some(T::from_f64(ctx.algorithm().nodata())));
    Ok(Some(raster))
}

fn grid_and_write<T>(ctx: &GridContext<'_>, extent: &GridExtent, output: &PathBuf) -> Result<()>
where
    T: RasterElement + Display,
{
    let Some(raster) = evaluate::<T>(ctx, extent)? else {
        return Ok(());
    };
    let stats = raster.statistics();
    info!(
        "Output: {} x {}, {} valid cells, {} nodata",
        raster.cols(),
        raster.rows(),
        stats.valid_count,
        stats.nodata_count
    );
    let pb = spinner("Writing output...");
    write_ascii_grid(&raster, output).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn run(grid: &GridArgs, algorithm: GridAlgorithm) -> Result<()> {
    let points = read_points(&grid.input)?;
    let extent = grid.extent(&points)?;
    info!(
        "Grid: {} x {} over ({}, {}) - ({}, {})",
        extent.cols, extent.rows, extent.x_min, extent.y_min, extent.x_max, extent.y_max
    );

    let start = Instant::now();
    let ctx = GridContext::new(points, algorithm, grid.config())
        .with_context(|| format!("Failed to prepare {}", algorithm.name()))?;
    info!(
        "Algorithm: {} ({} threads, index: {}, simd: {})",
        algorithm.name(),
        ctx.threads(),
        ctx.has_index(),
        ctx.simd_tier()
    );

    match grid.output_type {
        OutputType::Byte => grid_and_write::<u8>(&ctx, &extent, &grid.output)?,
        OutputType::Int16 => grid_and_write::<i16>(&ctx, &extent, &grid.output)?,
        OutputType::UInt16 => grid_and_write::<u16>(&ctx, &extent, &grid.output)?,
        OutputType::Int32 => grid_and_write::<i32>(&ctx, &extent, &grid.output)?,
        OutputType::Float32 => grid_and_write::<f32>(&ctx, &extent, &grid.output)?,
        OutputType::Float64 => grid_and_write::<f64>(&ctx, &extent, &grid.output)?,
    }
    done(algorithm.name(), &grid.output, start.elapsed());
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let points = read_points(&input)?;
            let bounds = points.bounds();
            let z = points.z();
            let (min, max) = z
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            let mean = z.iter().sum::<f64>() / z.len() as f64;

            println!("File: {}", input.display());
            println!("Points: {}", points.len());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
            );
            println!("\nValues:");
            println!("  Min: {:.4}", min);
            println!("  Max: {:.4}", max);
            println!("  Mean: {:.4}", mean);
        }

        Commands::Algorithms => {
            for name in ALGORITHM_NAMES {
                println!("{}", name);
            }
        }

        // ── Algorithms ───────────────────────────────────────────────
        Commands::Invdist {
            grid,
            ellipse,
            power,
            smoothing,
            max_points,
            min_points,
        } => {
            let algorithm = GridAlgorithm::InverseDistance(InverseDistanceParams {
                power,
                smoothing,
                radius1: ellipse.radius1,
                radius2: ellipse.radius2,
                angle: ellipse.angle,
                max_points,
                min_points,
                nodata: grid.nodata,
            });
            run(&grid, algorithm)?;
        }

        Commands::Invdistnn {
            grid,
            power,
            smoothing,
            radius,
            max_points,
            min_points,
        } => {
            let algorithm = GridAlgorithm::InverseDistanceNearest(InverseDistanceNearestParams {
                power,
                smoothing,
                radius,
                max_points,
                min_points,
                nodata: grid.nodata,
            });
            run(&grid, algorithm)?;
        }

        Commands::Average {
            grid,
            ellipse,
            min_points,
        } => {
            let algorithm = GridAlgorithm::MovingAverage(MovingAverageParams {
                radius1: ellipse.radius1,
                radius2: ellipse.radius2,
                angle: ellipse.angle,
                min_points,
                nodata: grid.nodata,
            });
            run(&grid, algorithm)?;
        }

        Commands::Nearest { grid, ellipse } => {
            let algorithm = GridAlgorithm::Nearest(NearestParams {
                radius1: ellipse.radius1,
                radius2: ellipse.radius2,
                angle: ellipse.angle,
                nodata: grid.nodata,
            });
            run(&grid, algorithm)?;
        }

        Commands::Metric {
            metric,
            grid,
            ellipse,
            min_points,
        } => {
            let algorithm = GridAlgorithm::Metric {
                metric: parse_metric(&metric)?,
                params: MetricParams {
                    radius1: ellipse.radius1,
                    radius2: ellipse.radius2,
                    angle: ellipse.angle,
                    min_points,
                    nodata: grid.nodata,
                },
            };
            run(&grid, algorithm)?;
        }

        Commands::Linear { grid, radius } => {
            let algorithm = GridAlgorithm::Linear(LinearParams {
                radius,
                nodata: grid.nodata,
            });
            run(&grid, algorithm)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_invdist() {
        let cli = Cli::try_parse_from([
            "gridder", "invdist", "in.xyz", "out.asc", "--power", "3", "--radius1", "5",
            "--radius2", "5", "--txe", "-10", "10", "--outsize", "20", "10", "-t", "4",
        ])
        .unwrap();
        let Commands::Invdist { grid, ellipse, power, .. } = cli.command else {
            panic!("expected invdist");
        };
        assert_eq!(power, 3.0);
        assert_eq!(ellipse.radius1, 5.0);
        assert_eq!(grid.txe, Some(vec![-10.0, 10.0]));
        assert_eq!(grid.outsize, vec![20, 10]);
        assert_eq!(grid.threads, ThreadCount::Fixed(4));
    }

    #[test]
    fn test_extent_defaults_to_bounds() {
        let cli = Cli::try_parse_from(["gridder", "nearest", "in.xyz", "out.asc"]).unwrap();
        let Commands::Nearest { grid, .. } = cli.command else {
            panic!("expected nearest");
        };
        assert_eq!(grid.threads, ThreadCount::AllCpus);
        let points = PointSet::owned(vec![0.0, 4.0], vec![1.0, 3.0], vec![0.0, 0.0]).unwrap();
        let extent = grid.extent(&points).unwrap();
        assert_eq!((extent.x_min, extent.x_max), (0.0, 4.0));
        assert_eq!((extent.y_min, extent.y_max), (1.0, 3.0));
        assert_eq!((extent.cols, extent.rows), (256, 256));
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!(parse_metric("Count").unwrap(), DataMetric::Count);
        assert!(parse_metric("median").is_err());
    }

    #[test]
    fn test_grid_and_write() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.asc");
        let points =
            PointSet::owned(vec![0.0, 10.0, 0.0], vec![0.0, 0.0, 10.0], vec![10.0, 20.0, 30.0])
                .unwrap();
        let ctx = GridContext::new(
            points,
            GridAlgorithm::Nearest(NearestParams::default()),
            GridConfig {
                threads: ThreadCount::Fixed(1),
                ..Default::default()
            },
        )
        .unwrap();
        let extent = GridExtent::new(0.0, 10.0, 0.0, 10.0, 2, 2);
        grid_and_write::<i16>(&ctx, &extent, &output).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let rows: Vec<&str> = text.lines().skip(6).collect();
        assert_eq!(rows, vec!["30 20", "10 20"]);
    }
}
