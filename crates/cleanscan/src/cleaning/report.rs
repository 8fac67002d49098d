//! Per-table accounting of what the normalizer removed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Why a row was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// A critical column was missing.
    MissingCritical,
    /// A binary flag held something other than 0 or 1.
    InvalidFlag,
    /// A strictly-positive column was zero, negative or missing.
    NonPositive,
    /// A bounded ordinal was outside its range or missing.
    OutOfRange,
    /// Exact duplicate of an earlier row.
    Duplicate,
}

impl DropReason {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            DropReason::MissingCritical => "missing critical value",
            DropReason::InvalidFlag => "invalid binary flag",
            DropReason::NonPositive => "non-positive value",
            DropReason::OutOfRange => "value out of range",
            DropReason::Duplicate => "duplicate row",
        }
    }
}

/// Counts of dropped rows by reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropCounts {
    pub missing_critical: usize,
    pub invalid_flag: usize,
    pub non_positive: usize,
    pub out_of_range: usize,
    pub duplicate: usize,
}

impl DropCounts {
    /// Record one dropped row.
    pub fn record(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingCritical => self.missing_critical += 1,
            DropReason::InvalidFlag => self.invalid_flag += 1,
            DropReason::NonPositive => self.non_positive += 1,
            DropReason::OutOfRange => self.out_of_range += 1,
            DropReason::Duplicate => self.duplicate += 1,
        }
    }

    /// Total number of dropped rows.
    pub fn total(&self) -> usize {
        self.missing_critical + self.invalid_flag + self.non_positive + self.out_of_range + self.duplicate
    }
}

/// Summary of one normalizer run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Rows received from the source.
    pub rows_fetched: usize,
    /// Rows in the cleaned table.
    pub rows_kept: usize,
    /// Dropped rows by reason.
    pub dropped: DropCounts,
    /// Drop-list columns that were present and removed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<String>,
    /// Cells per column that failed numeric or date coercion.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub coerced_to_null: IndexMap<String, usize>,
}

impl CleaningReport {
    /// Percentage of fetched rows that survived.
    pub fn retention(&self) -> f64 {
        if self.rows_fetched == 0 {
            100.0
        } else {
            (self.rows_kept as f64 / self.rows_fetched as f64) * 100.0
        }
    }
}
