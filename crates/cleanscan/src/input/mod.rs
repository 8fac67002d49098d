//! Row sources: where raw table rows come from.

mod parser;
mod source;

pub use parser::{CsvDirectorySource, parse_bytes};
pub use source::{MemorySource, RawRow, RawValue, RowSource, SourceMetadata, raw_row};
