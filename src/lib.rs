#![forbid(unsafe_code)]

//! Dominant-color extraction for batches of remote images.
//!
//! The engine reduces a decoded image to a color [`Histogram`](histogram::Histogram)
//! and runs iterative k-means with a median update rule to produce exactly
//! `k` representative colors. The [`pipeline`] module drives many such
//! quantizations concurrently: a task source reads URLs line by line, a
//! fixed pool of workers downloads and quantizes each image, and a sink
//! streams results into a CSV report as they complete.
//!
//! ```no_run
//! use batchquant::fetch::HttpResolver;
//! use batchquant::pipeline::{run_batch, PipelineConfig};
//! use std::io::BufReader;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let input = BufReader::new(std::fs::File::open("input.txt")?);
//! let output = std::fs::File::create("results.csv")?;
//! let resolver = HttpResolver::new("./tmp")?;
//!
//! let stats = run_batch(input, output, &resolver, &PipelineConfig::default())?;
//! println!("done: {} palettes extracted", stats.completed);
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod error;
pub mod fetch;
pub mod histogram;
pub mod kmeans;
pub mod pipeline;

pub use color::Color;
pub use error::{PipelineError, QuantizeError};
pub use histogram::{Histogram, HistogramEntry, Surface};
pub use kmeans::{quantize, quantize_surface};
pub use pipeline::{run_batch, BatchResult, BatchStats, PipelineConfig};
