//! # linedex
//!
//! Positional indexing and random access for **line-delimited datasets** stored as a
//! directory of partition files (JSON Lines, CSV, TSV).
//!
//! Indexing scans every partition once and records, for each logical record, the file
//! it lives in and its exact byte span `[start, end)`. Records pass through a pipeline of
//! enrichers on the way, which can attach metadata columns or drop records entirely. The
//! result is a compact table, persisted as Parquet, that maps a dense ordinal `0..N` to a
//! location. Reading record `i` later means slicing that span out of a memory-mapped
//! file and decoding it, with no scanning and no full load of the dataset.
//!
//! ## Key Features
//!
//! - **Byte-exact spans** - delimiters excluded, `\r\n` handled, blank lines skipped
//! - **Pluggable formats** - the [`Loader`] trait; JSON Lines and delimited loaders built in
//! - **Enrichment** - per-item and batched stages ([`ItemEnricher`], [`BatchEnricher`])
//! - **Sequential or parallel indexing** - deterministic order, or a worker pool
//! - **Typed persisted schema** - Parquet with inferred `meta_*` column types, or JSON Lines
//! - **Memory-mapped random access** - [`IndexedReader`] with optional field projection
//!
//! ## Quick Start
//!
//! ```no_run
//! use linedex::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let options = IndexOptions {
//!     enrichers: vec!["non_empty_text".into(), "text_length".into()],
//!     ..IndexOptions::default()
//! };
//!
//! // Scan data/corpus/*.jsonl and *.json, write data/corpus/index.parquet
//! let run = build_index("data/corpus", &options)?;
//! println!("{}", run.stats);
//!
//! // Random access by ordinal
//! let reader = IndexedReader::open("data/corpus", &options.reader_options().with_field("text"))?;
//! for i in 0..reader.len().min(3) {
//!     println!("{i}: {}", reader.get(i)?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Locations and rows
//!
//! A [`RecordLocation`] is `(filename, start, end)`. Enrichers annotate a [`FileItem`]
//! (location + decoded record + metadata) and the survivors become [`IndexRow`]s, whose
//! metadata keys are persisted with a `meta_` prefix.
//!
//! ### Indexers
//!
//! [`FileIndexer`] indexes one file lazily, in byte order. [`DirectoryIndexer`] discovers
//! partitions by glob and runs a `FileIndexer` over each, in the chosen [`ExecMode`].
//!
//! ### Execution Modes
//!
//! - `ExecMode::Sequential` - one file at a time; identical output on every run
//! - `ExecMode::Parallel { workers }` - rows from different files interleave in
//!   completion order; rows of one file keep their byte order
//!
//! ### Errors
//!
//! Every fallible call returns [`anyhow::Result`]. Failures worth matching on are rooted
//! in [`IndexError`]; see [`error`].
//!
//! ## Feature Flags
//!
//! - `io-csv` - delimited loaders (`csv`, `csv_space_separated`, `tsv`)
//! - `io-parquet` - Parquet index store (requires Arrow)
//!
//! Both are enabled by default. Without `io-parquet`, write the index with a `.jsonl`
//! output file name.
//!
//! ## Module Overview
//!
//! - [`loader`] - record formats and byte-exact scanning
//! - [`enrich`] - enrichment stages and the built-in registry
//! - [`indexer`] - file and directory indexing, discovery
//! - [`table`] - the in-memory index table and its materialization
//! - [`store`] - persistence of index tables
//! - [`reader`] - memory-mapped random access
//! - [`dataset`] - one-call indexing from [`IndexOptions`]
//! - [`testing`] - fixtures and assertions for tests

pub mod config;
pub mod dataset;
pub mod enrich;
pub mod error;
pub mod indexer;
pub mod loader;
pub mod reader;
pub mod stats;
pub mod store;
pub mod table;
pub mod testing;
pub mod types;

pub use config::{DEFAULT_INDEX_FILENAME, IndexOptions, ReaderOptions};
pub use dataset::{IndexRun, build_index, directory_indexer, index_dataset, write_index};
pub use enrich::{BatchEnricher, Enricher, EnrichmentPipeline, ItemEnricher};
pub use error::IndexError;
pub use indexer::{DirectoryIndexer, ExecMode, FileIndexer, MalformedPolicy};
pub use loader::{JsonLinesLoader, Loader};
pub use reader::IndexedReader;
pub use stats::{IndexStats, StatsSnapshot};
pub use store::{JsonlStore, TableStore};
pub use table::{IndexTable, materialize};
pub use types::{FileItem, IndexRow, ItemMetadata, Record, RecordLocation};

#[cfg(feature = "io-csv")]
pub use loader::DelimitedLoader;

#[cfg(feature = "io-parquet")]
pub use store::ParquetStore;
