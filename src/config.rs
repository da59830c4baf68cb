//! Run configuration for indexing and random access.
//!
//! Both option structs are plain data with public fields and a sensible [`Default`].
//! They deserialize from JSON with every field optional, so a config file only needs
//! to name what it changes:
//!
//! ```json
//! { "loader": "csv", "patterns": ["*.csv"], "parallel": true, "max_records": 1000 }
//! ```

use crate::indexer::{DEFAULT_PATTERNS, ExecMode, MalformedPolicy};
use crate::enrich::DEFAULT_TEXT_KEY;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default name of the persisted index inside the dataset root.
pub const DEFAULT_INDEX_FILENAME: &str = "index.parquet";

/// Settings for one indexing run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexOptions {
    /// Glob patterns matched against file names directly under the root.
    pub patterns: Vec<String>,
    /// Loader registry name.
    pub loader: String,
    /// Enricher registry names, in pipeline order.
    pub enrichers: Vec<String>,
    /// Record field the built-in enrichers read.
    pub text_key: String,
    /// Items buffered per call to the batched enrichers.
    pub batch_size: usize,
    /// Global cap on emitted rows. `None` indexes everything.
    pub max_records: Option<usize>,
    /// Index files on a worker pool instead of the calling thread.
    pub parallel: bool,
    /// Worker count for parallel runs. `None` uses the number of CPUs.
    pub workers: Option<usize>,
    /// When set, the base `text_length` column holds the character count of this field.
    pub text_length_key: Option<String>,
    pub on_malformed: MalformedPolicy,
    /// Index file name, relative to the dataset root. The extension picks the store.
    pub output_filename: String,
    /// Columns written dictionary-encoded where the store supports it.
    pub categorical_columns: Vec<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
            loader: "jsonl".to_string(),
            enrichers: Vec::new(),
            text_key: DEFAULT_TEXT_KEY.to_string(),
            batch_size: 1,
            max_records: None,
            parallel: false,
            workers: None,
            text_length_key: None,
            on_malformed: MalformedPolicy::Abort,
            output_filename: DEFAULT_INDEX_FILENAME.to_string(),
            categorical_columns: vec!["filename".to_string()],
        }
    }
}

impl IndexOptions {
    /// Load options from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Unreadable file, malformed JSON, or unknown fields.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    #[must_use]
    pub fn exec_mode(&self) -> ExecMode {
        if self.parallel {
            ExecMode::Parallel {
                workers: self.workers,
            }
        } else {
            ExecMode::Sequential
        }
    }

    /// Reader settings that open what this run writes.
    #[must_use]
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            index_filename: self.output_filename.clone(),
            loader: self.loader.clone(),
            field: None,
        }
    }
}

/// Settings for [`IndexedReader::open`](crate::reader::IndexedReader::open).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderOptions {
    /// Index file name, relative to the dataset root.
    pub index_filename: String,
    /// Loader registry name; must match the one used to build the index.
    pub loader: String,
    /// Project every record onto this field.
    pub field: Option<String>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            index_filename: DEFAULT_INDEX_FILENAME.to_string(),
            loader: "jsonl".to_string(),
            field: None,
        }
    }
}

impl ReaderOptions {
    /// Load options from a JSON file. Missing fields take their defaults.
    ///
    /// # Errors
    /// Unreadable file, malformed JSON, or unknown fields.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse options from {}", path.display()))
}
