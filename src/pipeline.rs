//! Fan-out/fan-in batch pipeline: one task source, a fixed pool of worker
//! threads, one result sink.
//!
//! Tasks and results travel over rendezvous channels
//! (`mpsc::sync_channel(0)`), so handoffs are unbuffered: the source blocks
//! until a worker takes a task, and a worker blocks until the sink accepts
//! its result. Each task is delivered to exactly one worker; result order
//! is completion order, not submission order.
//!
//! Shutdown is two-phase. Workers exit when the task channel is closed and
//! drained; the result channel closes when the last worker drops its
//! sender; the sink then drains the remaining results and flushes.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::color::{self, Color};
use crate::error::PipelineError;
use crate::fetch::ImageResolver;
use crate::histogram::Histogram;
use crate::kmeans;

/// Tuning knobs for one batch run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Worker pool size, fixed for the whole run.
    pub workers: usize,
    /// Palette size `k` passed to every quantization.
    pub cluster_count: usize,
    /// Base seed for per-worker random generators. `None` draws one from
    /// entropy; setting it makes a run reproducible.
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            cluster_count: 3,
            seed: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn cluster_count(mut self, k: usize) -> Self {
        self.cluster_count = k;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One successfully processed task: the originating URL plus exactly `k`
/// palette colors in centroid-index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub url: String,
    pub colors: Vec<Color>,
}

impl BatchResult {
    /// Palette colors as canonical `#RRGGBB` strings.
    pub fn hex_colors(&self) -> Vec<String> {
        self.colors.iter().map(|&c| color::to_hex(c)).collect()
    }
}

/// Outcome counters for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Results written to the report.
    pub completed: u64,
    /// Tasks dropped after acquisition, decode, or quantization failure.
    pub failed: u64,
    /// Input lines dropped before reaching the pool (blank or malformed).
    pub skipped: u64,
}

/// Run the whole batch: read tasks from `input` (one URL per line), process
/// them with `config.workers` concurrent workers through `resolver` and the
/// quantization engine, and append one CSV record per success to `output`
/// in completion order.
///
/// Per-task failures are logged and counted, never fatal. The call returns
/// once the task source is exhausted, every in-flight task has finished,
/// and the report is flushed.
///
/// # Errors
///
/// Only report-level failures (final flush) abort the run.
pub fn run_batch<R, W>(
    input: R,
    output: W,
    resolver: &(impl ImageResolver + ?Sized),
    config: &PipelineConfig,
) -> Result<BatchStats, PipelineError>
where
    R: BufRead + Send,
    W: Write,
{
    let workers = config.workers.max(1);
    let base_seed = config.seed.unwrap_or_else(rand::random);
    info!(
        "starting batch: {workers} workers, k={}, seed={base_seed}",
        config.cluster_count
    );

    let (task_tx, task_rx) = mpsc::sync_channel::<String>(0);
    let (result_tx, result_rx) = mpsc::sync_channel::<BatchResult>(0);
    let task_rx = Arc::new(Mutex::new(task_rx));

    let skipped = AtomicU64::new(0);
    let failed = AtomicU64::new(0);

    thread::scope(|scope| {
        let skipped_ref = &skipped;
        scope.spawn(move || feed_tasks(input, task_tx, skipped_ref));

        for worker_id in 0..workers {
            let tasks = Arc::clone(&task_rx);
            let results = result_tx.clone();
            let failed_ref = &failed;
            let rng = SmallRng::seed_from_u64(base_seed.wrapping_add(worker_id as u64));
            let k = config.cluster_count;
            scope.spawn(move || worker_loop(worker_id, tasks, results, resolver, k, rng, failed_ref));
        }
        // the workers now hold the only result senders; the sink loop below
        // ends exactly when the last of them exits
        drop(result_tx);

        let mut writer = csv::Writer::from_writer(output);
        let mut completed = 0u64;
        for result in result_rx {
            let mut record = Vec::with_capacity(result.colors.len() + 1);
            record.push(result.url.clone());
            record.extend(result.hex_colors());

            match writer.write_record(&record) {
                Ok(()) => completed += 1,
                Err(err) => warn!("could not write report record for {}: {err}", result.url),
            }
        }
        writer.flush().map_err(csv::Error::from)?;

        Ok(BatchStats {
            completed,
            failed: failed.load(Ordering::Relaxed),
            skipped: skipped.load(Ordering::Relaxed),
        })
    })
}

/// Task source: one valid URL per input line into the task channel.
/// Blank and malformed lines are dropped with a warning and counted.
fn feed_tasks(input: impl BufRead, tasks: SyncSender<String>, skipped: &AtomicU64) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!("task source read error, stopping: {err}");
                break;
            }
        };

        let task = line.trim();
        if let Err(source) = url::Url::parse(task) {
            warn!(
                "{}",
                PipelineError::MalformedTask {
                    line: task.to_owned(),
                    source,
                }
            );
            skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if tasks.send(task.to_owned()).is_err() {
            // every worker is gone; nothing left to feed
            break;
        }
    }
}

/// Worker: pull tasks until the source closes, resolve each to an image,
/// quantize, and hand the result to the sink. Failures drop the task.
fn worker_loop(
    worker_id: usize,
    tasks: Arc<Mutex<Receiver<String>>>,
    results: SyncSender<BatchResult>,
    resolver: &(impl ImageResolver + ?Sized),
    cluster_count: usize,
    mut rng: SmallRng,
    failed: &AtomicU64,
) {
    loop {
        let received = match tasks.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break, // a sibling worker panicked while holding the lock
        };
        let url = match received {
            Ok(url) => url,
            Err(_) => break, // task channel closed and drained
        };

        match process_task(&url, resolver, cluster_count, &mut rng) {
            Ok(result) => {
                if results.send(result).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!("dropping task {url}: {err}");
                failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    debug!("worker {worker_id} finished");
}

fn process_task(
    url: &str,
    resolver: &(impl ImageResolver + ?Sized),
    cluster_count: usize,
    rng: &mut SmallRng,
) -> Result<BatchResult, PipelineError> {
    let image = resolver.resolve(url)?;
    let histogram = Histogram::from_surface(&image);
    let colors = kmeans::quantize(&histogram, cluster_count, rng)?;

    Ok(BatchResult {
        url: url.to_owned(),
        colors,
    })
}
