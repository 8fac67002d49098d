//! Column definitions and typed cell values.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::types::ColumnType;

/// Format used when dates are rendered back to text.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Schema for a single cleaned column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub column_type: ColumnType,
}

impl ColumnSpec {
    /// Create a new column spec.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// A typed value in a cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Number(f64),
    Date(NaiveDateTime),
    Text(String),
}

/// Hashable identity of a cell, used for exact-duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Null,
    Number(u64),
    Date(NaiveDateTime),
    Text(String),
}

impl Cell {
    /// Whether the cell is missing.
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Render the cell as text; missing values render as "".
    pub fn to_text(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Number(n) => format_number(*n),
            Cell::Date(d) => d.format(DATE_FORMAT).to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    /// Identity for duplicate detection. `-0.0` and `0.0` compare equal.
    pub fn key(&self) -> CellKey {
        match self {
            Cell::Null => CellKey::Null,
            Cell::Number(n) => CellKey::Number(number_bits(*n)),
            Cell::Date(d) => CellKey::Date(*d),
            Cell::Text(s) => CellKey::Text(s.clone()),
        }
    }
}

/// Bit pattern of a number with signed zero folded.
pub(crate) fn number_bits(value: f64) -> u64 {
    if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
}

/// Render a number the way a database export would: integers without a
/// fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}
