//! Error categories raised by indexing and random access.
//!
//! All public functions return [`anyhow::Result`]. The failures a caller may want to
//! react to programmatically are rooted in [`IndexError`], so they can be recovered with
//! `err.downcast_ref::<IndexError>()` after any amount of added context.
//!
//! | Category      | Variants                                                      |
//! |---------------|---------------------------------------------------------------|
//! | Configuration | [`UnknownLoader`], [`UnknownEnricher`], [`NoMatchingFiles`],  |
//! |               | [`NestedPattern`]                                             |
//! | Decode        | [`Decode`]                                                    |
//! | Enricher      | [`Enricher`], [`BatchMisaligned`], [`WorkerPanicked`]         |
//! | Resource      | [`SpanOutOfBounds`], [`UnmappedFile`] (plus plain I/O errors) |
//! | Lookup        | [`OrdinalOutOfRange`]                                         |
//!
//! [`UnknownLoader`]: IndexError::UnknownLoader
//! [`UnknownEnricher`]: IndexError::UnknownEnricher
//! [`NoMatchingFiles`]: IndexError::NoMatchingFiles
//! [`NestedPattern`]: IndexError::NestedPattern
//! [`Decode`]: IndexError::Decode
//! [`Enricher`]: IndexError::Enricher
//! [`BatchMisaligned`]: IndexError::BatchMisaligned
//! [`WorkerPanicked`]: IndexError::WorkerPanicked
//! [`SpanOutOfBounds`]: IndexError::SpanOutOfBounds
//! [`UnmappedFile`]: IndexError::UnmappedFile
//! [`OrdinalOutOfRange`]: IndexError::OrdinalOutOfRange

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("unknown loader {name:?} (available: {available})")]
    UnknownLoader { name: String, available: String },

    #[error("unknown enricher {name:?} (available: {available})")]
    UnknownEnricher { name: String, available: String },

    #[error("no files found matching glob patterns {patterns:?} in {}", root.display())]
    NoMatchingFiles { root: PathBuf, patterns: Vec<String> },

    #[error("glob pattern {0:?} must match files directly under the root")]
    NestedPattern(String),

    #[error("decode record {filename}[{start}..{end}]: {reason}")]
    Decode {
        filename: String,
        start: u64,
        end: u64,
        reason: String,
    },

    #[error("enricher {stage:?} failed on {filename}[{start}..{end}]: {reason}")]
    Enricher {
        stage: String,
        filename: String,
        start: u64,
        end: u64,
        reason: String,
    },

    #[error("batched enricher {stage:?} returned {got} slots for a batch of {expected}")]
    BatchMisaligned {
        stage: String,
        expected: usize,
        got: usize,
    },

    /// A parallel worker panicked while indexing `path`.
    #[error("indexing worker panicked on {}: {message}", path.display())]
    WorkerPanicked { path: PathBuf, message: String },

    #[error("span {start}..{end} exceeds {filename} ({len} bytes mapped)")]
    SpanOutOfBounds {
        filename: String,
        start: u64,
        end: u64,
        len: usize,
    },

    #[error("file {0:?} is not mapped by this reader")]
    UnmappedFile(String),

    #[error("ordinal {ordinal} out of range for an index of {len} rows")]
    OrdinalOutOfRange { ordinal: usize, len: usize },
}

impl IndexError {
    /// `true` for errors raised before any record is read.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownLoader { .. }
                | Self::UnknownEnricher { .. }
                | Self::NoMatchingFiles { .. }
                | Self::NestedPattern(_)
        )
    }
}
