//! Error types for the cleanscan library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline operations.
///
/// Row-level data problems never surface here: they are recovered by the
/// normalizer dropping the row. Empty tables are valid input everywhere.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A declared critical or numeric column is absent from the table.
    #[error("Schema error in table '{table}': column '{column}' is missing")]
    Schema { table: String, column: String },

    /// Detector label vectors of different lengths reached the reconciler.
    #[error(
        "Alignment error: density detector produced {density} labels, reconstruction detector produced {reconstruction}"
    )]
    Alignment {
        density: usize,
        reconstruction: usize,
    },

    /// Model training ran past its wall-clock budget.
    #[error("Training budget exceeded: {elapsed_ms} ms elapsed, budget {budget_ms} ms")]
    TrainingBudgetExceeded { elapsed_ms: u128, budget_ms: u128 },

    /// Table name that is not one of the known logical tables.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Annotation already recorded for this key.
    #[error("Key '{0}' is already annotated")]
    DuplicateAnnotation(String),

    /// Error saving or loading persisted state.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Build a schema error for a table and column.
    pub fn schema(table: impl Into<String>, column: impl Into<String>) -> Self {
        PipelineError::Schema {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Whether this error aborts only the affected table's run.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PipelineError::Schema { .. } | PipelineError::Alignment { .. }
        )
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
