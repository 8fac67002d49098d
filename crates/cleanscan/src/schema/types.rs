//! Core type definitions for table schemas.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Declared data type for a cleaned column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Floating-point numbers (identifiers and flags included).
    Numeric,
    /// Date and/or time values.
    Date,
    /// Free text.
    Text,
}

impl ColumnType {
    /// Returns true if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Numeric)
    }

    /// Returns true if this type is temporal.
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnType::Date)
    }
}

impl Default for ColumnType {
    fn default() -> Self {
        ColumnType::Text
    }
}

/// The logical tables of the product schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalTable {
    /// Product sub-families.
    ArSfamille,
    /// Product families.
    Arfamille,
    /// Articles.
    Article,
    /// Barcodes with prices.
    Codebarre,
    /// Suppliers.
    Fournisseur,
    /// Seasons.
    Saison,
    /// Size grids.
    Tailles,
}

impl LogicalTable {
    /// Every logical table, in pipeline order.
    pub const ALL: [LogicalTable; 7] = [
        LogicalTable::ArSfamille,
        LogicalTable::Arfamille,
        LogicalTable::Article,
        LogicalTable::Codebarre,
        LogicalTable::Fournisseur,
        LogicalTable::Saison,
        LogicalTable::Tailles,
    ];

    /// Storage name of the table.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalTable::ArSfamille => "ar_sfamille",
            LogicalTable::Arfamille => "arfamille",
            LogicalTable::Article => "article",
            LogicalTable::Codebarre => "codebarre",
            LogicalTable::Fournisseur => "fournisseur",
            LogicalTable::Saison => "saison",
            LogicalTable::Tailles => "tailles",
        }
    }
}

impl fmt::Display for LogicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalTable {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        LogicalTable::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PipelineError::UnknownTable(s.to_string()))
    }
}
