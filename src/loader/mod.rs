//! Record loaders: byte-exact scanning of partition files and decoding of single spans.
//!
//! A [`Loader`] has two halves that must agree with each other:
//! - [`Loader::scan`] walks a file front to back with a byte cursor and yields one
//!   [`ScannedRecord`] per logical record. The span excludes the line delimiter, so the
//!   same bytes can be sliced out of a memory map later.
//! - [`Loader::decode`] turns such a span back into a [`Record`].
//!
//! Scans never buffer whole files. A record that fails to decode is still yielded, with
//! its location and an [`IndexError::Decode`], so the caller decides whether to abort or
//! skip while the cursor stays in sync.
//!
//! Loaders are selected by name through [`loader_by_name`]:
//!
//! | name                   | loader                                  |
//! |------------------------|-----------------------------------------|
//! | `jsonl`, `json_lines`  | [`JsonLinesLoader`]                     |
//! | `csv`                  | [`DelimitedLoader`] with `,` (io-csv)   |
//! | `csv_space_separated`  | [`DelimitedLoader`] with ` ` (io-csv)   |
//! | `tsv`                  | [`DelimitedLoader`] with `\t` (io-csv)  |

pub mod jsonl;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod delimited;

pub use jsonl::JsonLinesLoader;

#[cfg(feature = "io-csv")]
pub use delimited::DelimitedLoader;

use crate::error::IndexError;
use crate::types::{Record, RecordLocation};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// One record produced by a scan. `record` is `Err` when the span could not be decoded.
#[derive(Debug)]
pub struct ScannedRecord {
    pub location: RecordLocation,
    pub record: std::result::Result<Record, IndexError>,
}

/// Lazy record sequence returned by [`Loader::scan`].
///
/// An outer `Err` is an I/O failure and ends the sequence.
pub type RecordScan = Box<dyn Iterator<Item = Result<ScannedRecord>> + Send>;

/// Pluggable record format.
pub trait Loader: Send + Sync {
    /// Registry name, used in logs.
    fn name(&self) -> &str;

    /// Decode one record span (delimiter excluded).
    fn decode(&self, bytes: &[u8]) -> Result<Record>;

    /// Scan a file into records with exact byte spans.
    fn scan(&self, path: &Path) -> Result<RecordScan>;

    /// Return a loader bound to one file's contents, if decoding depends on data
    /// outside the record span (such as a header row). `None` means `self` decodes
    /// every span of the file as is.
    fn specialize(&self, _contents: &[u8]) -> Result<Option<Arc<dyn Loader>>> {
        Ok(None)
    }
}

/// Resolve a loader by registry name.
///
/// # Errors
/// [`IndexError::UnknownLoader`] if `name` is not registered.
pub fn loader_by_name(name: &str) -> Result<Arc<dyn Loader>> {
    let loader: Arc<dyn Loader> = match name {
        "jsonl" | "json_lines" => Arc::new(JsonLinesLoader),
        #[cfg(feature = "io-csv")]
        "csv" => Arc::new(DelimitedLoader::new(b',')),
        #[cfg(feature = "io-csv")]
        "csv_space_separated" => Arc::new(DelimitedLoader::new(b' ')),
        #[cfg(feature = "io-csv")]
        "tsv" => Arc::new(DelimitedLoader::new(b'\t')),
        _ => {
            return Err(IndexError::UnknownLoader {
                name: name.to_string(),
                available: loader_names().join(", "),
            }
            .into());
        }
    };
    Ok(loader)
}

/// Names accepted by [`loader_by_name`].
#[must_use]
pub fn loader_names() -> Vec<&'static str> {
    let mut names = vec!["jsonl", "json_lines"];
    if cfg!(feature = "io-csv") {
        names.extend(["csv", "csv_space_separated", "tsv"]);
    }
    names
}

/// File name component used as the `filename` column.
pub(crate) fn partition_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |n| n.to_string_lossy())
        .into_owned()
}

/// A physical line: its span (delimiter excluded) and its bytes.
pub(crate) struct Line<'a> {
    pub start: u64,
    pub end: u64,
    pub bytes: &'a [u8],
}

impl Line<'_> {
    pub fn is_blank(&self) -> bool {
        self.bytes.iter().all(u8::is_ascii_whitespace)
    }
}

/// Forward-only line reader that tracks the byte offset of every line.
///
/// Strips a trailing `\n` and a `\r` before it from the reported span. The final line
/// of a file may lack a delimiter.
pub(crate) struct LineCursor {
    reader: BufReader<File>,
    pos: u64,
    buf: Vec<u8>,
    done: bool,
}

impl LineCursor {
    pub fn open(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        Ok(Self {
            reader: BufReader::new(f),
            pos: 0,
            buf: Vec::new(),
            done: false,
        })
    }

    /// Next line, or `None` at end of file. After an error, always `None`.
    pub fn next_line(&mut self) -> Option<std::io::Result<Line<'_>>> {
        if self.done {
            return None;
        }
        self.buf.clear();
        let read = match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                return None;
            }
            Ok(n) => n,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        let start = self.pos;
        self.pos += read as u64;

        let mut len = self.buf.len();
        if self.buf[..len].ends_with(b"\n") {
            len -= 1;
            if self.buf[..len].ends_with(b"\r") {
                len -= 1;
            }
        }
        Some(Ok(Line {
            start,
            end: start + len as u64,
            bytes: &self.buf[..len],
        }))
    }
}

/// Convert a decode failure into the location-carrying error yielded by scans.
pub(crate) fn decode_error(location: &RecordLocation, err: &anyhow::Error) -> IndexError {
    IndexError::Decode {
        filename: location.filename.clone(),
        start: location.start,
        end: location.end,
        reason: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cursor_reports_spans_without_delimiters() -> Result<()> {
        let mut f = tempfile::NamedTempFile::new()?;
        f.write_all(b"ab\r\n\ncde\nf")?;
        let mut cursor = LineCursor::open(f.path())?;

        let mut spans = Vec::new();
        while let Some(line) = cursor.next_line() {
            let line = line?;
            spans.push((line.start, line.end, line.bytes.to_vec()));
        }

        assert_eq!(
            spans,
            vec![
                (0, 2, b"ab".to_vec()),
                (4, 4, Vec::new()),
                (5, 8, b"cde".to_vec()),
                (9, 10, b"f".to_vec()),
            ]
        );
        Ok(())
    }

    #[test]
    fn unknown_loader_lists_alternatives() {
        let err = loader_by_name("xml").err().map(|e| e.to_string()).unwrap_or_default();
        assert!(err.contains("unknown loader"));
        assert!(err.contains("jsonl"));
    }
}
