//! Throwaway datasets on disk.

use anyhow::{Context, Result};
use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PHRASES: &[&str] = &[
    "the quick brown fox",
    "jumps over the lazy dog",
    "naïve café owners",
    "",
    "lorem ipsum dolor sit amet",
    "über straße",
    "a",
];

/// Deterministic text for record `i`. Some texts contain multi-byte characters, so byte
/// and character lengths differ; none contain newlines.
#[must_use]
pub fn sample_text(i: usize) -> String {
    let phrase = PHRASES[i % PHRASES.len()];
    if phrase.is_empty() {
        format!("#{i}")
    } else {
        format!("{phrase} #{i}")
    }
}

/// Record `j` of partition `partition` in a fixture with `per_partition` records each:
/// `{"id": <global ordinal>, "partition": .., "text": ..}`.
#[must_use]
pub fn sample_record(partition: usize, j: usize, per_partition: usize) -> Value {
    let id = partition * per_partition + j;
    json!({ "id": id, "partition": partition, "text": sample_text(id) })
}

/// File name of partition `i` in [`DatasetFixture::jsonl`].
#[must_use]
pub fn partition_file_name(i: usize) -> String {
    format!("part-{i:03}.jsonl")
}

/// A dataset root in a temporary directory, removed on drop.
pub struct DatasetFixture {
    dir: TempDir,
}

impl DatasetFixture {
    /// Empty dataset root.
    ///
    /// # Errors
    /// The temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: TempDir::new().context("create fixture dir")?,
        })
    }

    /// `partitions` JSON-lines files named by [`partition_file_name`], each holding
    /// `records` lines from [`sample_record`].
    ///
    /// # Errors
    /// I/O failures while writing.
    pub fn jsonl(partitions: usize, records: usize) -> Result<Self> {
        let fixture = Self::new()?;
        for p in 0..partitions {
            let lines: Vec<Value> = (0..records).map(|j| sample_record(p, j, records)).collect();
            fixture.write_jsonl(&partition_file_name(p), &lines)?;
        }
        Ok(fixture)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write raw bytes to `name` under the root.
    ///
    /// # Errors
    /// I/O failures while writing.
    pub fn write_file(&self, name: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.path(name);
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    /// Write one compact JSON value per line, each terminated by `\n`.
    ///
    /// # Errors
    /// I/O or serialization failures.
    pub fn write_jsonl(&self, name: &str, records: &[Value]) -> Result<PathBuf> {
        let path = self.path(name);
        let mut f = fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
        for r in records {
            serde_json::to_writer(&mut f, r)?;
            f.write_all(b"\n")?;
        }
        Ok(path)
    }
}
