use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;

use batchquant::fetch::HttpResolver;
use batchquant::pipeline::{run_batch, PipelineConfig};

/// Extract dominant-color palettes from a batch of image URLs.
#[derive(Parser, Debug)]
#[command(name = "batchquant", version, about)]
struct Cli {
    /// Input file, one image URL per line
    #[arg(short, long, default_value = "input.txt")]
    input: PathBuf,

    /// CSV report path: url,hex1,..,hexK per processed image
    #[arg(short, long, default_value = "results.csv")]
    output: PathBuf,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = 10)]
    workers: usize,

    /// Palette size (clusters per image)
    #[arg(short = 'k', long = "colors", default_value_t = 3)]
    colors: usize,

    /// Staging directory for downloads; recreated on startup, removed on exit
    #[arg(long, default_value = "./tmp")]
    staging_dir: PathBuf,

    /// Seed for reproducible centroid initialization
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    anyhow::ensure!(cli.colors >= 1, "--colors must be at least 1");

    recreate_staging_dir(&cli.staging_dir)?;

    let input = File::open(&cli.input)
        .map(BufReader::new)
        .with_context(|| format!("could not open input file {}", cli.input.display()))?;
    let output = File::create(&cli.output)
        .with_context(|| format!("could not create report file {}", cli.output.display()))?;
    let resolver = HttpResolver::new(&cli.staging_dir)
        .context("could not build HTTP client")?;

    let mut config = PipelineConfig::new()
        .workers(cli.workers)
        .cluster_count(cli.colors);
    if let Some(seed) = cli.seed {
        config = config.seed(seed);
    }

    let stats = run_batch(input, output, &resolver, &config)
        .context("batch pipeline failed")?;

    if let Err(err) = std::fs::remove_dir_all(&cli.staging_dir) {
        warn!(
            "could not remove staging directory {}: {err}",
            cli.staging_dir.display()
        );
    }

    println!(
        "processed {} images ({} failed, {} skipped) -> {}",
        stats.completed,
        stats.failed,
        stats.skipped,
        cli.output.display()
    );
    Ok(())
}

/// Start from a clean staging area: drop whatever a previous run left
/// behind, then create the directory. Only the create is fatal.
fn recreate_staging_dir(dir: &std::path::Path) -> Result<()> {
    if dir.exists() {
        if let Err(err) = std::fs::remove_dir_all(dir) {
            warn!("could not clear stale staging directory {}: {err}", dir.display());
        }
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("could not create staging directory {}", dir.display()))
}
