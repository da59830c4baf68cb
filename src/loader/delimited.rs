//! Delimited-text loader (CSV, TSV, space separated).
//!
//! Rows are parsed with the `csv` crate one physical line at a time, so a quoted field
//! may contain delimiters but not line breaks. Each row becomes a JSON object keyed by
//! column name:
//! - explicit names from [`DelimitedLoader::with_names`], else
//! - the header row (line `header` among non-blank lines, default the first), else
//! - `col_0`, `col_1`, ...
//!
//! Lines before and including the header advance the cursor without producing records.

use super::{LineCursor, Loader, RecordScan, ScannedRecord, decode_error, partition_name};
use crate::types::{Record, RecordLocation};
use anyhow::{Context, Result, anyhow, bail};
use csv::{ReaderBuilder, StringRecord};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loader for one-row-per-line delimited files.
#[derive(Clone, Debug)]
pub struct DelimitedLoader {
    delimiter: u8,
    header: Option<usize>,
    names: Option<Vec<String>>,
}

impl DelimitedLoader {
    /// Loader with the given delimiter, treating the first non-blank line as header.
    #[must_use]
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter,
            header: Some(0),
            names: None,
        }
    }

    /// Index of the header line among non-blank lines, or `None` for headerless files.
    #[must_use]
    pub fn with_header(mut self, header: Option<usize>) -> Self {
        self.header = header;
        self
    }

    /// Explicit column names. A header row, if configured, is still consumed.
    #[must_use]
    pub fn with_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    #[must_use]
    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    fn parse_fields(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(bytes);
        let mut row = StringRecord::new();
        if !rdr.read_record(&mut row).context("parse delimited row")? {
            bail!("empty row");
        }
        Ok(row.iter().map(str::to_string).collect())
    }

    fn to_record(&self, fields: Vec<String>) -> Result<Record> {
        let mut obj = Map::with_capacity(fields.len());
        match &self.names {
            Some(names) => {
                if names.len() != fields.len() {
                    return Err(anyhow!(
                        "row has {} fields but {} column names are configured",
                        fields.len(),
                        names.len()
                    ));
                }
                for (name, field) in names.iter().zip(fields) {
                    obj.insert(name.clone(), Value::String(field));
                }
            }
            None => {
                for (i, field) in fields.into_iter().enumerate() {
                    obj.insert(format!("col_{i}"), Value::String(field));
                }
            }
        }
        Ok(Value::Object(obj))
    }
}

impl Loader for DelimitedLoader {
    fn name(&self) -> &str {
        match self.delimiter {
            b',' => "csv",
            b'\t' => "tsv",
            b' ' => "csv_space_separated",
            _ => "delimited",
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Record> {
        let fields = self.parse_fields(bytes)?;
        self.to_record(fields)
    }

    fn scan(&self, path: &Path) -> Result<RecordScan> {
        Ok(Box::new(DelimitedScan {
            cursor: LineCursor::open(path)?,
            path: path.to_path_buf(),
            filename: partition_name(path),
            loader: self.clone(),
            line_idx: 0,
        }))
    }

    fn specialize(&self, contents: &[u8]) -> Result<Option<Arc<dyn Loader>>> {
        let Some(header) = self.header else {
            return Ok(None);
        };
        if self.names.is_some() {
            return Ok(None);
        }
        let header_line = contents
            .split(|b| *b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .nth(header);
        let Some(line) = header_line else {
            return Ok(None);
        };
        let names = self.parse_fields(line).context("parse header row")?;
        Ok(Some(Arc::new(self.clone().with_names(names))))
    }
}

struct DelimitedScan {
    cursor: LineCursor,
    path: PathBuf,
    filename: String,
    loader: DelimitedLoader,
    /// Non-blank lines seen so far.
    line_idx: usize,
}

impl Iterator for DelimitedScan {
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
            let idx = self.line_idx;
            self.line_idx += 1;

            if let Some(header) = self.loader.header
                && idx <= header
            {
                if idx == header && self.loader.names.is_none() {
                    match self.loader.parse_fields(line.bytes) {
                        Ok(names) => self.loader.names = Some(names),
                        Err(e) => {
                            return Some(Err(e.context(format!(
                                "parse header row of {}",
                                self.path.display()
                            ))));
                        }
                    }
                }
                continue;
            }

            let location = RecordLocation::new(self.filename.clone(), line.start, line.end);
            let record = self
                .loader
                .decode(line.bytes)
                .map_err(|e| decode_error(&location, &e));
            return Some(Ok(ScannedRecord { location, record }));
        }
    }
}
