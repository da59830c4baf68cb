//! Write path: from partition files to index rows.
//!
//! - [`discover`]: glob-based partition discovery under a root.
//! - [`file`]: [`FileIndexer`], one file through loader and enrichment.
//! - [`directory`]: [`DirectoryIndexer`], many files with sequential or parallel
//!   aggregation.

pub mod directory;
pub mod discover;
pub mod file;

pub use directory::{DirectoryIndexer, DirectoryRows, ExecMode};
pub use discover::{DEFAULT_PATTERNS, discover_files};
pub use file::{FileIndexer, FileRows, MalformedPolicy};
