//! Image acquisition: HTTP download into a staging area, decode, clean up.
//!
//! The pipeline only sees the [`ImageResolver`] trait; this module provides
//! the real HTTP-backed implementation. Staged files are private per task
//! (unique names) and removed individually after use; the caller performs a
//! final bulk cleanup of the whole staging directory.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::warn;

use crate::error::PipelineError;

/// Bound on a single download, including connect and body transfer.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// The download+decode collaborator: turns a task URL into a decoded
/// RGB surface. Implementations must be shareable across worker threads.
///
/// Tests substitute an in-memory stub here; production uses
/// [`HttpResolver`].
pub trait ImageResolver: Sync {
    fn resolve(&self, url: &str) -> Result<image::RgbImage, PipelineError>;
}

/// Downloads each URL into a staging directory, decodes it with the
/// `image` crate, and deletes the staged file afterwards.
pub struct HttpResolver {
    client: reqwest::blocking::Client,
    staging_dir: PathBuf,
    sequence: AtomicU64,
}

impl HttpResolver {
    /// Build a resolver staging downloads under `staging_dir`.
    ///
    /// The directory must already exist; creating it is a startup concern
    /// of the caller.
    pub fn new(staging_dir: impl Into<PathBuf>) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            staging_dir: staging_dir.into(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Unique staged path for one task. A process-wide counter plus the
    /// wall clock keeps concurrent downloads of the same URL from
    /// colliding.
    fn stage_path(&self, url: &str) -> PathBuf {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let basename = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download");
        // keep only filename-safe characters from the URL segment
        let basename: String = basename
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            .take(64)
            .collect();

        self.staging_dir.join(format!("{seq}_{nanos}_{basename}"))
    }

    fn download(&self, url: &str, path: &Path) -> Result<(), PipelineError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|source| PipelineError::Acquisition {
                url: url.to_owned(),
                source,
            })?;

        let mut file = File::create(path).map_err(|source| PipelineError::Staging {
            path: path.to_owned(),
            source,
        })?;

        response
            .copy_to(&mut file)
            .map_err(|source| PipelineError::Acquisition {
                url: url.to_owned(),
                source,
            })?;

        Ok(())
    }
}

impl ImageResolver for HttpResolver {
    fn resolve(&self, url: &str) -> Result<image::RgbImage, PipelineError> {
        let path = self.stage_path(url);
        self.download(url, &path)?;

        let decoded = image::open(&path).map_err(|source| PipelineError::Decode {
            url: url.to_owned(),
            source,
        });

        remove_staged(&path);
        Ok(decoded?.to_rgb8())
    }
}

/// Delete one staged file. Best-effort: the whole staging directory is
/// bulk-removed after the batch, so a leftover file is only noise.
pub fn remove_staged(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!("could not remove staged file {}: {err}", path.display());
    }
}
