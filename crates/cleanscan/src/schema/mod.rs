//! Table schemas, cleaning rules and cleaned table types.

mod column;
mod rules;
mod table;
mod types;

pub use column::{Cell, CellKey, ColumnSpec, DATE_FORMAT, format_number};
pub(crate) use column::number_bits;
pub use rules::{RangeRule, TableRules};
pub use table::CleanedTable;
pub use types::{ColumnType, LogicalTable};
