use std::path::PathBuf;

use thiserror::Error;

/// Errors from the quantization engine itself.
#[derive(Debug, Error)]
pub enum QuantizeError {
    #[error("cluster count must be at least 1, got {0}")]
    InvalidClusterCount(usize),

    #[error("cannot quantize an empty histogram (zero-pixel surface)")]
    EmptyHistogram,

    /// Assignment was asked to scan an empty centroid set. With a valid
    /// cluster count this cannot happen; callers inside the convergence
    /// loop fall back to the entry's previous cluster and log the anomaly
    /// instead of aborting.
    #[error("no centroid available for assignment")]
    EmptyCentroidSet,

    #[error("malformed hex color {0:?}, expected #RRGGBB")]
    MalformedHex(String),
}

/// Per-task and report-level errors of the batch pipeline.
///
/// Task-scoped variants (`MalformedTask`, `Acquisition`, `Staging`,
/// `Decode`) are skip-and-continue: the task is dropped with a warning
/// and the batch keeps running. No retries anywhere.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("malformed task url {line:?}")]
    MalformedTask {
        line: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to fetch {url}")]
    Acquisition {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to stage download at {path}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image from {url}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write report record")]
    Report(#[from] csv::Error),

    #[error(transparent)]
    Quantize(#[from] QuantizeError),
}
