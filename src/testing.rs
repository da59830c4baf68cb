//! Helpers for testing code built on linedex.
//!
//! - **Fixtures**: [`DatasetFixture`] lays out a throwaway dataset directory of
//!   partition files; [`sample_text`] and [`sample_record`] generate its contents.
//! - **Assertions**: structural checks on index tables, such as
//!   [`assert_locations_well_formed`].
//!
//! ```no_run
//! use linedex::testing::*;
//! use linedex::{IndexOptions, index_dataset};
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = DatasetFixture::jsonl(3, 5)?;
//! let run = index_dataset(data.root(), &IndexOptions::default())?;
//! assert_eq!(run.table.len(), 15);
//! assert_locations_well_formed(&run.table, data.root());
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
