//! Partition discovery by glob pattern.
//!
//! Patterns are matched directly under a dataset root (`*.jsonl`, `part-??.csv`, ...).
//! Patterns may not contain path separators or `**`. Matches from all patterns are
//! merged, restricted to regular files, de-duplicated, and sorted lexicographically so every run visits
//! files in the same order.
//!
//! ```no_run
//! use linedex::indexer::discover_files;
//!
//! let files = discover_files("data/corpus", &["*.jsonl", "*.json"])?;
//! # use anyhow::Error; Ok::<(), Error>(())
//! ```

use crate::error::IndexError;
use anyhow::{Context, Result};
use glob::{Pattern, glob};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Default patterns: newline-delimited JSON under either extension.
pub const DEFAULT_PATTERNS: &[&str] = &["*.jsonl", "*.json"];

/// Expand `patterns` under `root` into a sorted, de-duplicated list of files.
///
/// # Errors
///
/// Returns an error if:
/// - a pattern is invalid, or reaches below the root ([`IndexError::NestedPattern`])
/// - a directory entry cannot be read while matching
/// - nothing matches ([`IndexError::NoMatchingFiles`])
pub fn discover_files<S: AsRef<str>>(root: impl AsRef<Path>, patterns: &[S]) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let escaped = Pattern::escape(&root.to_string_lossy());
    let prefix = escaped.trim_end_matches('/');

    let mut found = BTreeSet::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        if pattern.contains("**") || pattern.chars().any(std::path::is_separator) {
            return Err(IndexError::NestedPattern(pattern.to_string()).into());
        }
        let full = format!("{prefix}/{pattern}");
        let paths = glob(&full).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        for entry in paths {
            let path =
                entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
            if path.is_file() {
                found.insert(path);
            }
        }
    }

    if found.is_empty() {
        return Err(IndexError::NoMatchingFiles {
            root: root.to_path_buf(),
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
        }
        .into());
    }
    Ok(found.into_iter().collect())
}
