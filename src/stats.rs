//! Run statistics for indexing.
//!
//! [`IndexStats`] is a cheap, cloneable handle over atomic counters. The same handle is
//! shared by every [`FileIndexer`](crate::indexer::FileIndexer) of a run, including those
//! running on worker threads, and read back with [`IndexStats::snapshot`].

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Default)]
struct Counters {
    files: AtomicU64,
    scanned: AtomicU64,
    dropped: AtomicU64,
    skipped_malformed: AtomicU64,
    emitted: AtomicU64,
}

/// Shared counters for one indexing run.
#[derive(Clone)]
pub struct IndexStats {
    inner: Arc<Counters>,
    started: Instant,
}

impl Default for IndexStats {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Counters::default()),
            started: Instant::now(),
        }
    }

    pub(crate) fn file_done(&self) {
        self.inner.files.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scanned(&self) {
        self.inner.scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn dropped(&self, n: u64) {
        self.inner.dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn skipped_malformed(&self) {
        self.inner.skipped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn emitted(&self, n: u64) {
        self.inner.emitted.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &self.inner;
        StatsSnapshot {
            files: c.files.load(Ordering::Relaxed),
            records_scanned: c.scanned.load(Ordering::Relaxed),
            records_dropped: c.dropped.load(Ordering::Relaxed),
            records_skipped_malformed: c.skipped_malformed.load(Ordering::Relaxed),
            rows_emitted: c.emitted.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Counter values at one point in time.
///
/// `rows_emitted` counts rows produced by file indexers; with a global cap the
/// materialized table may hold fewer. Rows are counted when their batch is flushed, so
/// after a failed run the count includes rows that were discarded with the failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub files: u64,
    pub records_scanned: u64,
    pub records_dropped: u64,
    pub records_skipped_malformed: u64,
    pub rows_emitted: u64,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} scanned, {} dropped, {} malformed skipped, {} rows in {:.2?}",
            self.files,
            self.records_scanned,
            self.records_dropped,
            self.records_skipped_malformed,
            self.rows_emitted,
            self.elapsed
        )
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}
