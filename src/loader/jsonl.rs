//! JSON Lines loader.
//!
//! Every non-blank line is one JSON document. Blank and whitespace-only lines advance
//! the cursor without producing a record.

use super::{LineCursor, Loader, RecordScan, ScannedRecord, decode_error, partition_name};
use crate::types::{Record, RecordLocation};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Loader for newline-delimited JSON (`*.jsonl`, `*.json`).
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonLinesLoader;

impl Loader for JsonLinesLoader {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn decode(&self, bytes: &[u8]) -> Result<Record> {
        serde_json::from_slice(bytes).context("parse JSON line")
    }

    fn scan(&self, path: &Path) -> Result<RecordScan> {
        Ok(Box::new(JsonlScan {
            cursor: LineCursor::open(path)?,
            path: path.to_path_buf(),
            filename: partition_name(path),
        }))
    }
}

struct JsonlScan {
    cursor: LineCursor,
    path: PathBuf,
    filename: String,
}

impl Iterator for JsonlScan {
    type Item = Result<ScannedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.cursor.next_line()? {
                Ok(line) => line,
                Err(e) => {
                    return Some(
                        Err(e).with_context(|| format!("read {}", self.path.display())),
                    );
                }
            };
            if line.is_blank() {
                continue;
            }
            let location = RecordLocation::new(self.filename.clone(), line.start, line.end);
            let record = JsonLinesLoader
                .decode(line.bytes)
                .map_err(|e| decode_error(&location, &e));
            return Some(Ok(ScannedRecord { location, record }));
        }
    }
}
