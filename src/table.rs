//! The in-memory index table and its materialization from a row stream.
//!
//! An [`IndexTable`] is the ordered output of one indexing run. Its row order is the
//! positional index used by [`IndexedReader`](crate::reader::IndexedReader): ordinal
//! `i` always refers to the `i`-th row.

use crate::types::{IndexRow, META_PREFIX};
use anyhow::Result;
use std::collections::BTreeSet;

/// Base columns every table carries, in column order.
pub const BASE_COLUMNS: [&str; 3] = ["filename", "start", "end"];

/// Optional base column holding the text length.
pub const TEXT_LENGTH_COLUMN: &str = "text_length";

/// Ordered rows of one indexing run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexTable {
    rows: Vec<IndexRow>,
}

impl IndexTable {
    #[must_use]
    pub fn new(rows: Vec<IndexRow>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn row(&self, ordinal: usize) -> Option<&IndexRow> {
        self.rows.get(ordinal)
    }

    #[must_use]
    pub fn rows(&self) -> &[IndexRow] {
        &self.rows
    }

    #[must_use]
    pub fn into_rows(self) -> Vec<IndexRow> {
        self.rows
    }

    /// Keep only rows matching `keep`, preserving order.
    #[must_use]
    pub fn filter(mut self, mut keep: impl FnMut(&IndexRow) -> bool) -> Self {
        self.rows.retain(|row| keep(row));
        self
    }

    #[must_use]
    pub fn has_text_length(&self) -> bool {
        self.rows.iter().any(|r| r.text_length.is_some())
    }

    /// Union of un-prefixed enrichment keys, sorted.
    #[must_use]
    pub fn meta_keys(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|r| r.meta.keys().map(String::as_str))
            .collect()
    }

    /// Column names: base columns, then `text_length` if any row has it, then the
    /// prefixed enrichment columns in sorted order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = BASE_COLUMNS.iter().map(|c| (*c).to_string()).collect();
        if self.has_text_length() {
            cols.push(TEXT_LENGTH_COLUMN.to_string());
        }
        cols.extend(self.meta_keys().into_iter().map(|k| format!("{META_PREFIX}{k}")));
        cols
    }

    /// Distinct file names referenced by the rows, sorted.
    #[must_use]
    pub fn filenames(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.filename.as_str()).collect()
    }
}

impl FromIterator<IndexRow> for IndexTable {
    fn from_iter<I: IntoIterator<Item = IndexRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Collect a row stream into a table, stopping after `max_records` rows if given.
///
/// Rows are kept in arrival order. The cap is applied to whatever order the stream
/// produces; upstream producers are not told to stop.
///
/// # Errors
/// The first `Err` item of the stream.
pub fn materialize<I>(rows: I, max_records: Option<usize>) -> Result<IndexTable>
where
    I: IntoIterator<Item = Result<IndexRow>>,
{
    let rows = rows.into_iter();
    let rows: Vec<IndexRow> = match max_records {
        Some(cap) => rows.take(cap).collect::<Result<_>>()?,
        None => rows.collect::<Result<_>>()?,
    };
    Ok(IndexTable::new(rows))
}
