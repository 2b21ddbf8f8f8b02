//! Merge engine: two strategies for turning mappings into an output table
//!
//! - [`RowConcatenator`] stacks the data rows of every mapped source file
//!   under the template headers (interactive preview and export).
//! - [`KeyedLookup`] rewrites the template's own rows from matching source
//!   rows (server-held download).
//!
//! Unresolvable mappings never abort either strategy; they leave cells blank
//! or unchanged.

pub mod concat;
pub mod lookup;

pub use concat::RowConcatenator;
pub use lookup::{KeyedLookup, PREVIEW_ROWS};
