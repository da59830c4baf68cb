//! JSON Lines table store: one flat object per row.
//!
//! Objects use the table's column names (`filename`, `start`, `end`, `text_length`,
//! `meta_*`), so the file reads naturally with any JSONL tool. Blank lines are skipped
//! on read.

use super::TableStore;
use crate::table::IndexTable;
use crate::types::IndexRow;
use anyhow::{Context, Result, anyhow};
use std::fs::{File, create_dir_all};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Row-oriented store backed by newline-delimited JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonlStore;

impl TableStore for JsonlStore {
    fn write(&self, table: &IndexTable, path: &Path) -> Result<usize> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
        }
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        let mut w = BufWriter::new(f);
        for (i, row) in table.rows().iter().enumerate() {
            serde_json::to_writer(&mut w, &row.to_object())
                .with_context(|| format!("serialize row #{} to {}", i, path.display()))?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
        Ok(table.len())
    }

    fn read(&self, path: &Path) -> Result<IndexTable> {
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let rdr = BufReader::new(f);
        let mut rows = Vec::new();
        for (i, line) in rdr.lines().enumerate() {
            let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            let value: serde_json::Value = serde_json::from_str(&line)
                .with_context(|| format!("parse index line {} in {}", i + 1, path.display()))?;
            let obj = match value {
                serde_json::Value::Object(obj) => obj,
                _ => return Err(anyhow!("index line {} in {} is not an object", i + 1, path.display())),
            };
            let row = IndexRow::from_object(obj)
                .with_context(|| format!("index line {} in {}", i + 1, path.display()))?;
            rows.push(row);
        }
        Ok(IndexTable::new(rows))
    }
}
