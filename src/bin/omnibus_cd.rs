//! omnibus-cd: change detection on multi-temporal polarimetric SAR imagery

use anyhow::{bail, Context, Result};
use clap::Parser;
use omnibus::{ChangeDetectionParams, ChangeDetector, Window};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "omnibus-cd")]
#[command(author, version, about = "Multi-temporal complex Wishart change detection", long_about = None)]
struct Cli {
    /// Comma-separated input files (covariance or coherency matrix format).
    /// Later files must already be warped to the window of the first.
    infiles: String,

    /// Output file; a bare file name is written next to the first input
    outfile: PathBuf,

    /// Equivalent number of looks
    enl: f64,

    /// Spatial subset of the first image: x0,y0,cols,rows
    #[arg(short, long, value_parser = parse_window)]
    dims: Option<Window>,

    /// Significance level
    #[arg(short, long, default_value_t = 0.01)]
    significance: f64,

    /// Apply a 3x3 median filter to the change probabilities
    #[arg(short, long)]
    median_filter: bool,

    /// Process the window in strips of this many rows
    #[arg(long)]
    tile_rows: Option<usize>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_window(value: &str) -> Result<Window, String> {
    let parts = value
        .split(',')
        .map(|v| v.trim().parse::<usize>().map_err(|e| format!("'{}': {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    match parts.as_slice() {
        [x0, y0, cols, rows] => Ok(Window::new(*x0, *y0, *cols, *rows)),
        _ => Err(format!("expected x0,y0,cols,rows, got {} values", parts.len())),
    }
}

fn resolve_output(outfile: &Path, first_input: &Path) -> PathBuf {
    let has_dir = outfile
        .parent()
        .map_or(false, |parent| !parent.as_os_str().is_empty());
    if outfile.is_absolute() || has_dir {
        return outfile.to_path_buf();
    }
    let first = std::fs::canonicalize(first_input).unwrap_or_else(|_| first_input.to_path_buf());
    match first.parent() {
        Some(dir) => dir.join(outfile),
        None => outfile.to_path_buf(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let infiles: Vec<PathBuf> = cli
        .infiles
        .split(',')
        .filter(|name| !name.is_empty())
        .map(PathBuf::from)
        .collect();
    if infiles.len() < 2 {
        bail!("at least two comma-separated input files are required");
    }

    let params = ChangeDetectionParams {
        enl: cli.enl,
        significance: cli.significance,
        window: cli.dims,
        median_filter: cli.median_filter,
        tile_rows: cli.tile_rows,
    };

    let output = resolve_output(&cli.outfile, &infiles[0]);
    log::info!("Multi-temporal complex Wishart change detection");
    log::info!("First (reference) filename: {}", infiles[0].display());
    log::info!("Number of looks: {}", params.enl);

    let (summary, paths) = ChangeDetector::new(params)
        .run(&infiles, &output)
        .with_context(|| format!("change detection failed for {} images", infiles.len()))?;

    println!(
        "{} images, {} matrices: {} changed pixels ({:.2}%)",
        summary.images,
        summary.dimension,
        summary.changed_pixels,
        summary.changed_fraction * 100.0
    );
    println!("Statistic, probability and mask: {}", paths.statistic.display());
    println!("Change map: {}", paths.change_map.display());
    println!("Elapsed time: {:.2}s", summary.elapsed_seconds);

    Ok(())
}
