//! Random access to indexed records through memory-mapped partition files.
//!
//! An [`IndexedReader`] pairs an [`IndexTable`] with one read-only mapping per distinct
//! file the table references. Looking up ordinal `i` slices `[start, end)` out of that
//! file's mapping and decodes it with the loader the index was built with. Nothing is
//! read eagerly beyond the mappings themselves; pages are faulted in on access.
//!
//! The reader does not detect files that changed after indexing. Spans are bounds
//! checked against the mapped length, so a truncated file yields
//! [`IndexError::SpanOutOfBounds`] rather than a fault. A file rewritten in place with
//! different contents decodes garbage or fails to decode.
//!
//! Lookups take `&self`; the reader is `Send + Sync` and can be shared across threads.
//! Mappings and file handles are released on drop or [`IndexedReader::close`].

use crate::config::ReaderOptions;
use crate::error::IndexError;
use crate::loader::{Loader, loader_by_name};
use crate::store::store_for_path;
use crate::table::IndexTable;
use crate::types::{IndexRow, Record, RecordLocation};
use anyhow::{Context, Result};
use memmap2::Mmap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct MappedFile {
    _file: File,
    map: Mmap,
    decoder: Arc<dyn Loader>,
}

/// Positional reader over an index and its dataset.
pub struct IndexedReader {
    root: PathBuf,
    table: IndexTable,
    files: BTreeMap<String, MappedFile>,
    field: Option<String>,
}

impl IndexedReader {
    /// Read the persisted index under `root` and map every file it references.
    ///
    /// # Errors
    /// Unknown loader, unreadable index, or a referenced file that cannot be opened or
    /// mapped.
    pub fn open(root: impl AsRef<Path>, options: &ReaderOptions) -> Result<Self> {
        Self::open_filtered(root, options, |_| true)
    }

    /// Like [`IndexedReader::open`], keeping only rows for which `keep` returns `true`.
    /// Ordinals refer to the filtered table, and only files it still references are
    /// mapped.
    ///
    /// # Errors
    /// See [`IndexedReader::open`].
    pub fn open_filtered(
        root: impl AsRef<Path>,
        options: &ReaderOptions,
        keep: impl FnMut(&IndexRow) -> bool,
    ) -> Result<Self> {
        let root = root.as_ref();
        let loader = loader_by_name(&options.loader)?;
        let index_path = root.join(&options.index_filename);
        let table = store_for_path(&index_path, &[])?
            .read(&index_path)
            .with_context(|| format!("read index {}", index_path.display()))?;
        let mut reader = Self::from_table(root, table.filter(keep), loader)?;
        reader.field = options.field.clone();
        Ok(reader)
    }

    /// Build a reader over an in-memory table.
    ///
    /// # Errors
    /// A referenced file cannot be opened or mapped, or the loader rejects its contents
    /// (e.g. a delimited file without its header row).
    pub fn from_table(root: impl AsRef<Path>, table: IndexTable, loader: Arc<dyn Loader>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut files = BTreeMap::new();
        for name in table.filenames() {
            let mapped = map_file(&root.join(name), &loader)?;
            files.insert(name.to_string(), mapped);
        }
        log::debug!(
            "mapped {} files for {} rows under {}",
            files.len(),
            table.len(),
            root.display()
        );
        Ok(Self {
            root,
            table,
            files,
            field: None,
        })
    }

    /// Project [`IndexedReader::get`] onto one record field.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn table(&self) -> &IndexTable {
        &self.table
    }

    /// Names of the mapped files, sorted.
    pub fn mapped_files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// # Errors
    /// [`IndexError::OrdinalOutOfRange`].
    pub fn row(&self, ordinal: usize) -> Result<&IndexRow> {
        self.table.row(ordinal).ok_or_else(|| {
            IndexError::OrdinalOutOfRange {
                ordinal,
                len: self.table.len(),
            }
            .into()
        })
    }

    /// # Errors
    /// [`IndexError::OrdinalOutOfRange`].
    pub fn location(&self, ordinal: usize) -> Result<RecordLocation> {
        self.row(ordinal).map(IndexRow::location)
    }

    /// Raw bytes of record `ordinal`, borrowed from the mapping.
    ///
    /// # Errors
    /// [`IndexError::OrdinalOutOfRange`] or [`IndexError::SpanOutOfBounds`].
    pub fn bytes(&self, ordinal: usize) -> Result<&[u8]> {
        let row = self.row(ordinal)?;
        let file = self.mapped(&row.filename)?;
        Ok(span(&file.map, row)?)
    }

    /// Decoded record `ordinal`, unprojected.
    ///
    /// # Errors
    /// Lookup failures as in [`IndexedReader::bytes`], or a decode failure.
    pub fn get_record(&self, ordinal: usize) -> Result<Record> {
        let row = self.row(ordinal)?;
        let file = self.mapped(&row.filename)?;
        let bytes = span(&file.map, row)?;
        file.decoder
            .decode(bytes)
            .with_context(|| format!("decode {}[{}..{}]", row.filename, row.start, row.end))
    }

    /// One top-level field of record `ordinal`.
    ///
    /// # Errors
    /// As [`IndexedReader::get_record`], or the record has no such field.
    pub fn get_field(&self, ordinal: usize, field: &str) -> Result<Value> {
        let mut record = self.get_record(ordinal)?;
        record
            .get_mut(field)
            .map(Value::take)
            .with_context(|| format!("record {ordinal} has no field {field:?}"))
    }

    /// Record `ordinal`, projected onto the configured field if there is one. Records
    /// that decode to a bare string have no fields and are returned as they are.
    ///
    /// # Errors
    /// See [`IndexedReader::get_record`] and [`IndexedReader::get_field`].
    pub fn get(&self, ordinal: usize) -> Result<Record> {
        let record = self.get_record(ordinal)?;
        match (&self.field, record) {
            (Some(_), record @ Value::String(_)) | (None, record) => Ok(record),
            (Some(field), mut record) => record
                .get_mut(field.as_str())
                .map(Value::take)
                .with_context(|| format!("record {ordinal} has no field {field:?}")),
        }
    }

    /// All records in ordinal order, as [`IndexedReader::get`] returns them.
    pub fn iter(&self) -> impl Iterator<Item = Result<Record>> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }

    /// Release every mapping and file handle now.
    pub fn close(self) {
        log::debug!("closing reader over {} mapped files", self.files.len());
    }

    fn mapped(&self, filename: &str) -> Result<&MappedFile> {
        self.files
            .get(filename)
            .ok_or_else(|| IndexError::UnmappedFile(filename.to_string()).into())
    }
}

fn map_file(path: &Path, loader: &Arc<dyn Loader>) -> Result<MappedFile> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    // SAFETY: the mapping is read-only and never outlives `file`. Concurrent external
    // modification of the dataset is unsupported; spans are bounds checked regardless.
    let map = unsafe { Mmap::map(&file) }.with_context(|| format!("mmap {}", path.display()))?;
    let decoder = loader
        .specialize(&map)
        .with_context(|| format!("prepare {} loader for {}", loader.name(), path.display()))?
        .unwrap_or_else(|| Arc::clone(loader));
    Ok(MappedFile {
        _file: file,
        map,
        decoder,
    })
}

fn span<'a>(map: &'a Mmap, row: &IndexRow) -> std::result::Result<&'a [u8], IndexError> {
    let out_of_bounds = || IndexError::SpanOutOfBounds {
        filename: row.filename.clone(),
        start: row.start,
        end: row.end,
        len: map.len(),
    };
    let start = usize::try_from(row.start).map_err(|_| out_of_bounds())?;
    let end = usize::try_from(row.end).map_err(|_| out_of_bounds())?;
    map.get(start..end).ok_or_else(out_of_bounds)
}
