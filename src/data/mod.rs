//! Data layer: the record value model, path addressing and flattening.
//!
//! Records are owned by a `RecordSet` and never mutated; everything in here
//! reads them.

// Core value model
pub mod json_codec;
pub mod record_set;
pub mod value;

// Addressing and traversal
pub mod flattener;
pub mod path;

// Presentation helpers
pub mod cell_format;
pub mod record_sort;
