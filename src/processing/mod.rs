//! Normalization and cleaning stages shared by all source adapters
//!
//! - [`field_mapper`]: column label → metric heuristics
//! - [`summary`]: per-metric min/max/avg/count
//! - [`interpolation`]: gap filling (linear, forward fill, drop)

pub mod field_mapper;
pub mod interpolation;
pub mod summary;

pub use field_mapper::{classify_label, FieldMapper, FieldTarget};
pub use interpolation::{clean, CleaningMethod};
pub use summary::summarize;
