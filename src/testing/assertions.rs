//! Structural assertions on index tables.

use crate::table::IndexTable;
use crate::types::{IndexRow, RecordLocation};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Rows grouped by file name, each group in table order.
#[must_use]
pub fn rows_by_file(table: &IndexTable) -> BTreeMap<&str, Vec<&IndexRow>> {
    let mut groups: BTreeMap<&str, Vec<&IndexRow>> = BTreeMap::new();
    for row in table.rows() {
        groups.entry(row.filename.as_str()).or_default().push(row);
    }
    groups
}

/// Assert that, for every file under `root` referenced by `table`, its rows appear in
/// increasing `start` order, do not overlap, and lie within the file.
///
/// # Panics
///
/// Panics on the first violation, or if a referenced file cannot be inspected.
pub fn assert_locations_well_formed(table: &IndexTable, root: &Path) {
    for (name, rows) in rows_by_file(table) {
        let path = root.join(name);
        let size = fs::metadata(&path)
            .unwrap_or_else(|e| panic!("cannot stat {}: {e}", path.display()))
            .len();
        let mut covered = 0;
        let mut prev_end = 0;
        for (i, row) in rows.iter().enumerate() {
            assert!(
                row.start <= row.end,
                "{name}: row {i} has start {} after end {}",
                row.start,
                row.end
            );
            assert!(
                i == 0 || row.start >= prev_end,
                "{name}: row {i} starting at {} overlaps or precedes the previous row ending at {prev_end}",
                row.start
            );
            assert!(
                row.end <= size,
                "{name}: row {i} ends at {} beyond the file size {size}",
                row.end
            );
            covered += row.end - row.start;
            prev_end = row.end;
        }
        assert!(covered <= size, "{name}: spans cover {covered} bytes of a {size}-byte file");
    }
}

/// Assert that two tables hold the same rows as a multiset, ignoring row order.
///
/// # Panics
///
/// Panics if the row counts or the sorted rows differ.
pub fn assert_same_rows_unordered(actual: &IndexTable, expected: &IndexTable) {
    let key = |r: &&IndexRow| (r.filename.clone(), r.start, r.end);
    let mut a: Vec<&IndexRow> = actual.rows().iter().collect();
    let mut e: Vec<&IndexRow> = expected.rows().iter().collect();
    a.sort_by_key(key);
    e.sort_by_key(key);
    assert_eq!(
        a.len(),
        e.len(),
        "row count mismatch: expected {}, got {}",
        e.len(),
        a.len()
    );
    for (i, (x, y)) in a.iter().zip(&e).enumerate() {
        assert_eq!(x, y, "rows differ at sorted position {i}");
    }
}

/// Locations of `table`, in table order.
#[must_use]
pub fn locations(table: &IndexTable) -> Vec<RecordLocation> {
    table.rows().iter().map(IndexRow::location).collect()
}
