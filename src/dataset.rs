//! One-call indexing of a dataset directory from [`IndexOptions`].
//!
//! These helpers resolve the configured loader and enrichers, run a
//! [`DirectoryIndexer`], materialize the rows, and persist the table:
//!
//! ```no_run
//! use linedex::{IndexOptions, IndexedReader, build_index};
//!
//! let options = IndexOptions {
//!     enrichers: vec!["text_length".into()],
//!     ..IndexOptions::default()
//! };
//! let run = build_index("data/corpus", &options)?;
//! println!("{}", run.stats);
//!
//! let reader = IndexedReader::open("data/corpus", &options.reader_options())?;
//! let first = reader.get(0)?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use crate::config::IndexOptions;
use crate::enrich::EnrichmentPipeline;
use crate::indexer::{DirectoryIndexer, FileIndexer};
use crate::loader::loader_by_name;
use crate::stats::{IndexStats, StatsSnapshot};
use crate::store::store_for_path;
use crate::table::{IndexTable, materialize};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Outcome of an indexing run.
#[derive(Clone, Debug)]
pub struct IndexRun {
    pub table: IndexTable,
    pub stats: StatsSnapshot,
    /// Where the table was written, if it was.
    pub output: Option<PathBuf>,
}

/// Assemble the directory indexer described by `options`, reporting into `stats`.
///
/// The configured output file name is excluded from discovery.
///
/// # Errors
/// Unknown loader or enricher name.
pub fn directory_indexer(options: &IndexOptions, stats: &IndexStats) -> Result<DirectoryIndexer> {
    let loader = loader_by_name(&options.loader)?;
    let pipeline =
        EnrichmentPipeline::from_names_with_key(&options.enrichers, &options.text_key, options.batch_size)?;
    let mut file_indexer = FileIndexer::new(loader, pipeline)
        .with_malformed_policy(options.on_malformed)
        .with_stats(stats.clone());
    if let Some(key) = &options.text_length_key {
        file_indexer = file_indexer.with_text_length_column(key.clone());
    }
    Ok(DirectoryIndexer::new(file_indexer)
        .with_patterns(options.patterns.iter().cloned())
        .with_excluded([options.output_filename.clone()])
        .with_mode(options.exec_mode()))
}

/// Index `root` into an in-memory table without persisting it.
///
/// # Errors
/// Configuration errors, discovery errors (including no matching files), and the
/// first decode, enricher, or I/O failure of the run.
pub fn index_dataset(root: impl AsRef<Path>, options: &IndexOptions) -> Result<IndexRun> {
    let root = root.as_ref();
    let stats = IndexStats::new();
    let indexer = directory_indexer(options, &stats)?;
    let rows = indexer.index(root)?;
    let table = materialize(rows, options.max_records)
        .with_context(|| format!("index dataset {}", root.display()))?;

    let stats = stats.snapshot();
    log::info!("indexed {}: {stats}; kept {} rows", root.display(), table.len());
    Ok(IndexRun {
        table,
        stats,
        output: None,
    })
}

/// Persist `table` as `options.output_filename` under `root`. Returns the written path.
///
/// # Errors
/// Unsupported output extension or a write failure.
pub fn write_index(root: impl AsRef<Path>, table: &IndexTable, options: &IndexOptions) -> Result<PathBuf> {
    let path = root.as_ref().join(&options.output_filename);
    let store = store_for_path(&path, &options.categorical_columns)?;
    let written = store
        .write(table, &path)
        .with_context(|| format!("write index {}", path.display()))?;
    log::info!("wrote {written} index rows to {}", path.display());
    Ok(path)
}

/// [`index_dataset`] followed by [`write_index`].
///
/// # Errors
/// See both.
pub fn build_index(root: impl AsRef<Path>, options: &IndexOptions) -> Result<IndexRun> {
    let root = root.as_ref();
    let mut run = index_dataset(root, options)?;
    run.output = Some(write_index(root, &run.table, options)?);
    Ok(run)
}
