//! Table normalization: text cleanup, type coercion, domain rules and
//! deduplication.

mod normalizer;
mod report;

pub use normalizer::{Normalized, TableNormalizer, normalize_text, parse_date};
pub use report::{CleaningReport, DropCounts, DropReason};
