use std::{
    any::Any,
    num::NonZeroUsize,
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use walkdir::WalkDir;

use crate::{
    codec, HoldNoteParams, HoldNoteTransformer, HoldOutcome, KeyRemapParams, KeyRemapper, Result,
    Seed,
};

/// Shared counters of a batch run.
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicUsize,
    processed: AtomicUsize,
}

/// Point-in-time copy of [`Progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub processed: usize,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total: AtomicUsize::new(total),
            processed: AtomicUsize::new(0),
        }
    }

    /// Marks one file as done.
    pub fn complete(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes one file from the total. Never drops below the number of
    /// files already processed.
    pub fn fail(&self) {
        let _ = self
            .total
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                let floor = self.processed.load(Ordering::Relaxed);
                (total > floor).then(|| total - 1)
            });
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
        }
    }
}

/// Transformation applied to every file of a batch.
#[derive(Debug, Clone)]
pub enum Job {
    Remap(KeyRemapParams),
    Holds(HoldNoteParams),
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::Remap(_) => "remap",
            Job::Holds(_) => "holds",
        }
    }

    fn seed_phrase(&self) -> Option<&str> {
        match self {
            Job::Remap(params) => params.seed.as_deref(),
            Job::Holds(params) => params.seed.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Output directory. `None` writes next to each source file.
    pub output_dir: Option<PathBuf>,
    /// Worker threads. 0 uses the available parallelism.
    pub threads: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    Written(PathBuf),
    /// Left untouched, e.g. already converted.
    Skipped,
    Failed { kind: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub status: FileStatus,
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub progress: ProgressSnapshot,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.count(|status| matches!(status, FileStatus::Written(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|status| matches!(status, FileStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|status| matches!(status, FileStatus::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(&o.status)).count()
    }
}

/// Parses, transforms and writes one chart. Returns the written path, or
/// `None` when the transformation chose to skip the chart.
pub fn process_file(path: &Path, job: &Job, output_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let mut beatmap = codec::parse_file(path)?;
    let seed = Seed::resolve(job.seed_phrase());
    tracing::debug!(path = %path.display(), job = job.name(), %seed, "processing chart");

    match job {
        Job::Remap(params) => KeyRemapper::new(params.clone()).convert(&mut beatmap, seed)?,
        Job::Holds(params) => {
            let outcome = HoldNoteTransformer::new(params.clone()).transform(&mut beatmap, seed)?;
            if outcome == HoldOutcome::AlreadyConverted {
                return Ok(None);
            }
        }
    }

    let dir = match output_dir {
        Some(dir) => dir,
        None => path.parent().unwrap_or_else(|| Path::new(".")),
    };
    codec::write_file(&beatmap, dir).map(Some)
}

/// Runs `job` over `files` on a pool of scoped worker threads. A failing
/// file never stops the others.
pub fn run_batch(files: &[PathBuf], job: &Job, options: &BatchOptions) -> BatchReport {
    let progress = Progress::new(files.len());
    let next = AtomicUsize::new(0);
    let workers = worker_count(options.threads, files.len());
    let output_dir = options.output_dir.as_deref();

    tracing::info!(files = files.len(), workers, job = job.name(), "starting batch");

    let mut slots: Vec<Option<FileOutcome>> = (0..files.len()).map(|_| None).collect();
    thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    loop {
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(path) = files.get(index) else {
                            break;
                        };
                        let status =
                            run_one(path, &progress, || process_file(path, job, output_dir));
                        done.push((
                            index,
                            FileOutcome {
                                path: path.clone(),
                                status,
                            },
                        ));
                    }
                    done
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(done) => {
                    for (index, outcome) in done {
                        slots[index] = Some(outcome);
                    }
                }
                Err(_) => tracing::error!("batch worker panicked"),
            }
        }
    });

    let outcomes = slots
        .into_iter()
        .zip(files)
        .map(|(slot, path)| {
            slot.unwrap_or_else(|| FileOutcome {
                path: path.clone(),
                status: FileStatus::Failed {
                    kind: "panic",
                    message: "worker stopped before finishing this file".to_string(),
                },
            })
        })
        .collect();

    let report = BatchReport {
        outcomes,
        progress: progress.snapshot(),
    };
    tracing::info!(
        written = report.written(),
        skipped = report.skipped(),
        failed = report.failed(),
        "batch finished"
    );
    report
}

fn run_one(
    path: &Path,
    progress: &Progress,
    work: impl FnOnce() -> Result<Option<PathBuf>>,
) -> FileStatus {
    let status = match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(Some(output))) => {
            progress.complete();
            FileStatus::Written(output)
        }
        Ok(Ok(None)) => {
            progress.fail();
            FileStatus::Skipped
        }
        Ok(Err(err)) => {
            progress.fail();
            tracing::warn!(path = %path.display(), kind = err.kind(), %err, "chart failed");
            FileStatus::Failed {
                kind: err.kind(),
                message: err.to_string(),
            }
        }
        Err(payload) => {
            progress.fail();
            let message = panic_message(payload.as_ref());
            tracing::error!(path = %path.display(), %message, "chart panicked");
            FileStatus::Failed {
                kind: "panic",
                message,
            }
        }
    };

    let ProgressSnapshot { total, processed } = progress.snapshot();
    tracing::info!(processed, total, path = %path.display(), "progress");
    status
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn worker_count(requested: usize, files: usize) -> usize {
    let threads = if requested == 0 {
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    } else {
        requested
    };
    threads.min(files).max(1)
}

/// Expands `paths` to chart files: files are taken as given, directories are
/// walked recursively for `.osu` files. The result is sorted and deduplicated.
/// Unreadable directory entries are logged and skipped.
pub fn collect_chart_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!(%err, "failed to scan chart directory");
                    continue;
                }
            };
            if entry.file_type().is_file() && is_chart_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_chart_file(path: &Path) -> bool {
    let wanted = codec::FILE_EXTENSION.trim_start_matches('.');
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}
