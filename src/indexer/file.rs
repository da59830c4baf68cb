//! Single-file indexing: scan → item stages → batch buffer → batched stages → rows.

use crate::enrich::EnrichmentPipeline;
use crate::loader::{Loader, RecordScan};
use crate::stats::IndexStats;
use crate::types::{FileItem, IndexRow};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What to do with a record whose bytes cannot be decoded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedPolicy {
    /// Fail the file (and the run) with [`IndexError::Decode`](crate::error::IndexError::Decode).
    #[default]
    Abort,
    /// Log a warning, count the record, and continue with the next one.
    Skip,
}

/// Indexes one partition file at a time.
///
/// Cheap to clone: the loader and pipeline are shared, so one configured indexer can be
/// handed to many worker threads.
#[derive(Clone)]
pub struct FileIndexer {
    loader: Arc<dyn Loader>,
    pipeline: Arc<EnrichmentPipeline>,
    on_malformed: MalformedPolicy,
    text_length_key: Option<String>,
    stats: IndexStats,
}

impl FileIndexer {
    pub fn new(loader: Arc<dyn Loader>, pipeline: EnrichmentPipeline) -> Self {
        Self {
            loader,
            pipeline: Arc::new(pipeline),
            on_malformed: MalformedPolicy::default(),
            text_length_key: None,
            stats: IndexStats::new(),
        }
    }

    #[must_use]
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// Fill the base `text_length` column with the character count of `key`.
    #[must_use]
    pub fn with_text_length_column(mut self, key: impl Into<String>) -> Self {
        self.text_length_key = Some(key.into());
        self
    }

    /// Report into an existing statistics handle instead of a private one.
    #[must_use]
    pub fn with_stats(mut self, stats: IndexStats) -> Self {
        self.stats = stats;
        self
    }

    #[must_use]
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    #[must_use]
    pub fn loader(&self) -> &Arc<dyn Loader> {
        &self.loader
    }

    #[must_use]
    pub fn pipeline(&self) -> &EnrichmentPipeline {
        &self.pipeline
    }

    /// Start indexing `path`. Rows are produced lazily in byte-offset order.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened. Later failures surface as `Err`
    /// items, after which the iterator ends.
    pub fn index(&self, path: impl AsRef<Path>) -> Result<FileRows> {
        let path = path.as_ref();
        let scan = self
            .loader
            .scan(path)
            .with_context(|| format!("scan {} with {} loader", path.display(), self.loader.name()))?;
        Ok(FileRows {
            scan,
            indexer: self.clone(),
            path: path.to_path_buf(),
            buffer: Vec::with_capacity(self.pipeline.batch_size()),
            ready: VecDeque::new(),
            done: false,
        })
    }

    fn row_for(&self, item: FileItem) -> IndexRow {
        let text_length = self
            .text_length_key
            .as_deref()
            .and_then(|key| item.text(key))
            .map(|t| t.chars().count() as u64);
        item.into_row(text_length)
    }
}

/// Lazy row sequence for one file, see [`FileIndexer::index`].
pub struct FileRows {
    scan: RecordScan,
    indexer: FileIndexer,
    path: PathBuf,
    buffer: Vec<FileItem>,
    ready: VecDeque<IndexRow>,
    done: bool,
}

impl FileRows {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let batch = mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.indexer.pipeline.batch_size()),
        );
        let before = batch.len();
        let survivors = self.indexer.pipeline.enrich_batch(batch)?;
        let stats = &self.indexer.stats;
        stats.dropped((before - survivors.len()) as u64);
        stats.emitted(survivors.len() as u64);
        log::trace!(
            "{}: flushed batch of {before}, {} survived",
            self.path.display(),
            survivors.len()
        );
        for item in survivors {
            let row = self.indexer.row_for(item);
            self.ready.push_back(row);
        }
        Ok(())
    }

    fn fail(&mut self, err: anyhow::Error) -> Option<Result<IndexRow>> {
        self.done = true;
        self.buffer.clear();
        self.ready.clear();
        Some(Err(err))
    }
}

impl Iterator for FileRows {
    type Item = Result<IndexRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.ready.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            let Some(scanned) = self.scan.next() else {
                self.done = true;
                if let Err(e) = self.flush() {
                    return self.fail(e);
                }
                self.indexer.stats.file_done();
                log::debug!("indexed {}", self.path.display());
                continue;
            };
            let scanned = match scanned {
                Ok(scanned) => scanned,
                Err(e) => return self.fail(e),
            };
            self.indexer.stats.scanned();

            let record = match scanned.record {
                Ok(record) => record,
                Err(decode) => match self.indexer.on_malformed {
                    MalformedPolicy::Abort => return self.fail(decode.into()),
                    MalformedPolicy::Skip => {
                        log::warn!("skipping malformed record: {decode}");
                        self.indexer.stats.skipped_malformed();
                        continue;
                    }
                },
            };

            let item = FileItem::new(scanned.location, record);
            match self.indexer.pipeline.enrich_item(item) {
                Ok(Some(item)) => {
                    self.buffer.push(item);
                    if self.buffer.len() >= self.indexer.pipeline.batch_size()
                        && let Err(e) = self.flush()
                    {
                        return self.fail(e);
                    }
                }
                Ok(None) => self.indexer.stats.dropped(1),
                Err(e) => return self.fail(e),
            }
        }
    }
}

