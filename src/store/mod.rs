//! Persistence of [`IndexTable`]s.
//!
//! The indexing engine only needs "write a table of named columns" and "read it back";
//! [`TableStore`] is that seam. Two stores ship with the crate:
//!
//! - [`ParquetStore`] (feature `io-parquet`, default): columnar, typed enrichment
//!   columns, optional dictionary encoding for categorical columns.
//! - [`JsonlStore`]: one flat JSON object per row, handy for inspection and tests.
//!
//! [`store_for_path`] picks one by file extension. Writes are not atomic; publish with
//! write-to-temp-then-rename if readers may race the writer.

pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod parquet;

pub use jsonl::JsonlStore;

#[cfg(feature = "io-parquet")]
pub use parquet::ParquetStore;

use crate::table::IndexTable;
use anyhow::{Result, bail};
use std::path::Path;

/// Reads and writes whole index tables.
pub trait TableStore: Send + Sync {
    /// Write `table` to `path`, replacing any existing file. Returns rows written.
    fn write(&self, table: &IndexTable, path: &Path) -> Result<usize>;

    /// Read a table previously written by this store.
    fn read(&self, path: &Path) -> Result<IndexTable>;
}

/// Choose a store from the file extension (`.parquet`, `.jsonl`, `.json`).
///
/// `categorical` lists columns to dictionary-encode where the format supports it.
///
/// # Errors
/// Unsupported extension, or `.parquet` without the `io-parquet` feature.
#[cfg_attr(not(feature = "io-parquet"), allow(unused_variables))]
pub fn store_for_path(path: &Path, categorical: &[String]) -> Result<Box<dyn TableStore>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        #[cfg(feature = "io-parquet")]
        Some("parquet") => Ok(Box::new(ParquetStore::new().with_categorical(categorical.iter().cloned()))),
        Some("jsonl" | "json") => Ok(Box::new(JsonlStore)),
        _ => bail!("no index store for {}", path.display()),
    }
}
