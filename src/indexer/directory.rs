//! Directory indexing with sequential or fan-out aggregation.
//!
//! [`DirectoryIndexer`] discovers partition files under a root and runs a
//! [`FileIndexer`] over each of them. How rows from different files are combined depends
//! on the [`ExecMode`]:
//!
//! - **Sequential** drains each file completely before opening the next. Global row
//!   order is file order, then byte order within the file, so repeated runs produce
//!   identical tables.
//! - **Parallel** hands files to a dedicated worker pool. Workers push rows onto one
//!   shared, unbounded channel and follow each finished file with a single completion
//!   message. The coordinator forwards rows until every file has reported. Rows from
//!   different files interleave in completion order; rows from one file keep byte order.
//!
//! A worker that panics reports [`IndexError::WorkerPanicked`] for its file, which ends
//! the run like any other file failure. In sequential mode the panic unwinds to the
//! caller instead.
//!
//! The channel has no capacity bound. When the consumer is slower than the workers,
//! rows accumulate in memory.

use super::discover::{DEFAULT_PATTERNS, discover_files};
use super::file::{FileIndexer, FileRows};
use crate::error::IndexError;
use crate::types::IndexRow;
use anyhow::{Context, Result, anyhow};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, channel};

/// How files are processed and their rows aggregated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecMode {
    /// One file at a time on the calling thread. Deterministic order.
    #[default]
    Sequential,
    /// A pool of `workers` threads (`None` = number of CPUs). Unordered across files.
    Parallel { workers: Option<usize> },
}

/// Indexes every matching partition file under a root directory.
#[derive(Clone)]
pub struct DirectoryIndexer {
    indexer: FileIndexer,
    patterns: Vec<String>,
    excluded: Vec<String>,
    mode: ExecMode,
}

impl DirectoryIndexer {
    /// Indexer over [`DEFAULT_PATTERNS`] in sequential mode.
    pub fn new(indexer: FileIndexer) -> Self {
        Self {
            indexer,
            patterns: DEFAULT_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
            excluded: Vec::new(),
            mode: ExecMode::Sequential,
        }
    }

    #[must_use]
    pub fn with_patterns<S: Into<String>>(mut self, patterns: impl IntoIterator<Item = S>) -> Self {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Never index files with these names, even when a pattern matches them. Used to
    /// keep an index written into the dataset root out of later runs.
    #[must_use]
    pub fn with_excluded<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.excluded = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn file_indexer(&self) -> &FileIndexer {
        &self.indexer
    }

    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    #[must_use]
    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Files this indexer would visit, in visiting order.
    ///
    /// # Errors
    /// See [`discover_files`]. Excluded names do not count as matches.
    pub fn discover(&self, root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let root = root.as_ref();
        let files: Vec<PathBuf> = discover_files(root, &self.patterns)?
            .into_iter()
            .filter(|path| {
                let name = path.file_name().map(|n| n.to_string_lossy());
                !name.is_some_and(|n| self.excluded.iter().any(|e| *e == n))
            })
            .collect();
        if files.is_empty() {
            return Err(IndexError::NoMatchingFiles {
                root: root.to_path_buf(),
                patterns: self.patterns.clone(),
            }
            .into());
        }
        Ok(files)
    }

    /// Start indexing `root`. Discovery happens eagerly; rows are produced lazily.
    ///
    /// # Errors
    /// Discovery failures, including an empty match set, and worker pool setup
    /// failures. Per-file failures surface as `Err` items, after which the sequence ends.
    pub fn index(&self, root: impl AsRef<Path>) -> Result<DirectoryRows> {
        let root = root.as_ref();
        let files = self.discover(root)?;
        log::info!(
            "indexing {} files under {} ({:?})",
            files.len(),
            root.display(),
            self.mode
        );
        let inner = match self.mode {
            ExecMode::Sequential => Inner::Sequential(SequentialRows {
                indexer: self.indexer.clone(),
                files: files.into_iter(),
                current: None,
                failed: false,
            }),
            ExecMode::Parallel { workers } => {
                Inner::Parallel(ParallelRows::spawn(&self.indexer, files, workers)?)
            }
        };
        Ok(DirectoryRows { inner })
    }
}

/// Row sequence for a whole directory, see [`DirectoryIndexer::index`].
pub struct DirectoryRows {
    inner: Inner,
}

enum Inner {
    Sequential(SequentialRows),
    Parallel(ParallelRows),
}

impl Iterator for DirectoryRows {
    type Item = Result<IndexRow>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Sequential(rows) => rows.next(),
            Inner::Parallel(rows) => rows.next(),
        }
    }
}

struct SequentialRows {
    indexer: FileIndexer,
    files: std::vec::IntoIter<PathBuf>,
    current: Option<FileRows>,
    failed: bool,
}

impl Iterator for SequentialRows {
    type Item = Result<IndexRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(rows) = &mut self.current {
                match rows.next() {
                    Some(Ok(row)) => return Some(Ok(row)),
                    Some(Err(e)) => {
                        self.failed = true;
                        let path = rows.path().display().to_string();
                        return Some(Err(e.context(format!("index {path}"))));
                    }
                    None => self.current = None,
                }
            }
            let path = self.files.next()?;
            match self.indexer.index(&path) {
                Ok(rows) => self.current = Some(rows),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Messages sent from workers to the coordinator.
enum Message {
    Row(IndexRow),
    /// Sent exactly once per file, after all of its rows.
    FileDone { path: PathBuf, outcome: Result<()> },
}

struct ParallelRows {
    rx: Receiver<Message>,
    pending: usize,
    pool: Option<ThreadPool>,
    failed: bool,
}

impl ParallelRows {
    fn spawn(indexer: &FileIndexer, files: Vec<PathBuf>, workers: Option<usize>) -> Result<Self> {
        let workers = workers
            .filter(|n| *n > 0)
            .unwrap_or_else(num_cpus::get)
            .min(files.len().max(1));
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("linedex-worker-{i}"))
            .build()
            .context("build indexing worker pool")?;

        let (tx, rx) = channel();
        let pending = files.len();
        for path in files {
            let tx = tx.clone();
            let indexer = indexer.clone();
            pool.spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    index_into(&indexer, &path, |row| {
                        // A send only fails once the coordinator is gone; the row is discarded.
                        let _ = tx.send(Message::Row(row));
                    })
                }))
                .unwrap_or_else(|payload| {
                    Err(IndexError::WorkerPanicked {
                        path: path.clone(),
                        message: panic_message(payload.as_ref()),
                    }
                    .into())
                });
                let _ = tx.send(Message::FileDone { path, outcome });
            });
        }
        log::debug!("spawned {pending} file jobs on {workers} workers");

        Ok(Self {
            rx,
            pending,
            pool: Some(pool),
            failed: false,
        })
    }

    fn finish(&mut self) {
        // Every job has sent its completion message, so dropping the pool only
        // releases idle threads.
        self.pool.take();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn index_into(indexer: &FileIndexer, path: &Path, mut emit: impl FnMut(IndexRow)) -> Result<()> {
    for row in indexer.index(path)? {
        emit(row?);
    }
    Ok(())
}

impl Iterator for ParallelRows {
    type Item = Result<IndexRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pending == 0 {
            self.finish();
            return None;
        }
        loop {
            match self.rx.recv() {
                Ok(Message::Row(row)) => return Some(Ok(row)),
                Ok(Message::FileDone { path, outcome }) => {
                    self.pending -= 1;
                    if let Err(e) = outcome {
                        self.failed = true;
                        self.finish();
                        return Some(Err(e.context(format!("index {}", path.display()))));
                    }
                    if self.pending == 0 {
                        self.finish();
                        return None;
                    }
                }
                Err(_) => {
                    self.failed = true;
                    self.finish();
                    return Some(Err(anyhow!(
                        "indexing workers stopped with {} files unfinished",
                        self.pending
                    )));
                }
            }
        }
    }
}
