//! cleanscan: cleaning and dual-detector anomaly scanning for relational
//! table exports.
//!
//! Each logical table is normalized against a declarative rule set, its
//! numeric columns are standardized, and two independent unsupervised
//! detectors (an isolation forest and a bottleneck autoencoder) label the
//! rows. Their labels are reconciled into one verdict per row.
//!
//! # Core Principles
//!
//! - **Rule-driven**: every table's cleaning is configuration, not code
//! - **Aligned**: row indices stay aligned from the cleaned table to the verdicts
//! - **Reproducible**: both detectors are seeded
//!
//! # Example
//!
//! ```no_run
//! use cleanscan::{CsvDirectorySource, LogicalTable, Pipeline};
//!
//! let mut source = CsvDirectorySource::new("exports/");
//! let run = Pipeline::new()
//!     .run_table(&mut source, LogicalTable::Fournisseur)
//!     .unwrap();
//!
//! println!("Rows kept: {}", run.cleaning.rows_kept);
//! println!("Agreed anomalies: {}", run.reconciliation.summary.agreed_anomaly);
//! ```

pub mod annotation;
pub mod cleaning;
pub mod detection;
pub mod error;
pub mod features;
pub mod input;
pub mod reconcile;
pub mod schema;

mod pipeline;

pub use crate::pipeline::{Pipeline, PipelineConfig, TableRun, VerdictRow};
pub use annotation::{AnnotationStore, Label};
pub use cleaning::{CleaningReport, TableNormalizer};
pub use detection::{DetectorOutcome, LabelVector};
pub use error::{PipelineError, Result};
pub use features::{FeatureProjector, StandardizedMatrix};
pub use input::{CsvDirectorySource, MemorySource, RawRow, RawValue, RowSource, SourceMetadata};
pub use reconcile::{Reconciliation, ReconciliationSummary, Verdict, reconcile};
pub use schema::{Cell, CleanedTable, ColumnType, LogicalTable, TableRules};
