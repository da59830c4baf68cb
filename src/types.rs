//! Core data model shared by the write and read paths.
//!
//! A scan produces [`RecordLocation`]s and decoded [`Record`]s. They travel through the
//! enrichment pipeline as [`FileItem`]s and leave it flattened into [`IndexRow`]s.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A decoded record. JSON-lines records are arbitrary JSON values; delimited rows are
/// objects keyed by column name.
pub type Record = Value;

/// Prefix applied to enrichment keys when rows are flattened into table columns.
pub const META_PREFIX: &str = "meta_";

/// Byte span of one record inside one partition file (`end` exclusive).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordLocation {
    /// File name relative to the dataset root.
    pub filename: String,
    pub start: u64,
    pub end: u64,
}

impl RecordLocation {
    #[must_use]
    pub fn new(filename: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// Length of the span in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A location plus the metadata enrichers attached to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemMetadata {
    pub location: RecordLocation,
    pub info: BTreeMap<String, Value>,
}

impl ItemMetadata {
    #[must_use]
    pub fn new(location: RecordLocation) -> Self {
        Self {
            location,
            info: BTreeMap::new(),
        }
    }
}

/// Unit of flow through the enrichment pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct FileItem {
    pub meta: ItemMetadata,
    pub record: Record,
}

impl FileItem {
    #[must_use]
    pub fn new(location: RecordLocation, record: Record) -> Self {
        Self {
            meta: ItemMetadata::new(location),
            record,
        }
    }

    /// Attach (or overwrite) one enrichment value.
    pub fn add_info(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.meta.info.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn info(&self, key: &str) -> Option<&Value> {
        self.meta.info.get(key)
    }

    #[must_use]
    pub fn location(&self) -> &RecordLocation {
        &self.meta.location
    }

    /// String value of a top-level record field, if present.
    #[must_use]
    pub fn text(&self, key: &str) -> Option<&str> {
        self.record.get(key).and_then(Value::as_str)
    }

    /// Flatten into the persisted row shape. Consumes the item.
    #[must_use]
    pub fn into_row(self, text_length: Option<u64>) -> IndexRow {
        let RecordLocation {
            filename,
            start,
            end,
        } = self.meta.location;
        IndexRow {
            filename,
            start,
            end,
            text_length,
            meta: self.meta.info,
        }
    }
}

/// One persisted index entry.
///
/// `meta` holds un-prefixed enrichment keys; [`META_PREFIX`] is applied by
/// [`IndexRow::column_name`] and the table stores.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexRow {
    pub filename: String,
    pub start: u64,
    pub end: u64,
    pub text_length: Option<u64>,
    pub meta: BTreeMap<String, Value>,
}

impl IndexRow {
    #[must_use]
    pub fn location(&self) -> RecordLocation {
        RecordLocation::new(self.filename.clone(), self.start, self.end)
    }

    /// Enrichment value by un-prefixed key.
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    /// Table column name for an enrichment key.
    #[must_use]
    pub fn column_name(key: &str) -> String {
        format!("{META_PREFIX}{key}")
    }

    /// Value of any table column (`filename`, `start`, `end`, `text_length`, `meta_*`).
    #[must_use]
    pub fn column(&self, name: &str) -> Option<Value> {
        match name {
            "filename" => Some(Value::from(self.filename.as_str())),
            "start" => Some(Value::from(self.start)),
            "end" => Some(Value::from(self.end)),
            "text_length" => self.text_length.map(Value::from),
            other => other
                .strip_prefix(META_PREFIX)
                .and_then(|key| self.meta.get(key))
                .cloned(),
        }
    }

    /// Flat column-name → value object, as written by row-oriented stores.
    #[must_use]
    pub fn to_object(&self) -> Map<String, Value> {
        let mut obj = Map::with_capacity(3 + self.meta.len());
        obj.insert("filename".into(), Value::from(self.filename.as_str()));
        obj.insert("start".into(), Value::from(self.start));
        obj.insert("end".into(), Value::from(self.end));
        if let Some(len) = self.text_length {
            obj.insert("text_length".into(), Value::from(len));
        }
        for (key, value) in &self.meta {
            obj.insert(Self::column_name(key), value.clone());
        }
        obj
    }

    /// Inverse of [`IndexRow::to_object`]. Columns that are neither base columns nor
    /// prefixed enrichment columns are ignored; `null` enrichment values are dropped.
    ///
    /// # Errors
    /// Missing or mistyped `filename`, `start`, or `end`, or a non-integer
    /// `text_length`.
    pub fn from_object(obj: Map<String, Value>) -> Result<Self> {
        let mut filename = None;
        let mut start = None;
        let mut end = None;
        let mut text_length = None;
        let mut meta = BTreeMap::new();
        for (name, value) in obj {
            match name.as_str() {
                "filename" => filename = value.as_str().map(str::to_string),
                "start" => start = value.as_u64(),
                "end" => end = value.as_u64(),
                "text_length" if !value.is_null() => {
                    text_length = Some(
                        value
                            .as_u64()
                            .ok_or_else(|| anyhow!("text_length is not an unsigned integer"))?,
                    );
                }
                _ => {
                    if let Some(key) = name.strip_prefix(META_PREFIX)
                        && !value.is_null()
                    {
                        meta.insert(key.to_string(), value);
                    }
                }
            }
        }
        Ok(Self {
            filename: filename.ok_or_else(|| anyhow!("missing string column `filename`"))?,
            start: start.ok_or_else(|| anyhow!("missing unsigned column `start`"))?,
            end: end.ok_or_else(|| anyhow!("missing unsigned column `end`"))?,
            text_length,
            meta,
        })
    }
}
