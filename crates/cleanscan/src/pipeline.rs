//! Pipeline struct and public API.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cleaning::{CleaningReport, TableNormalizer};
use crate::detection::{
    Autoencoder, AutoencoderConfig, DetectorOutcome, IsolationForest, IsolationForestConfig,
};
use crate::error::{PipelineError, Result};
use crate::features::{FeatureProjector, Projection, ProjectorConfig, StandardizedMatrix, project_2d};
use crate::input::RowSource;
use crate::reconcile::{Reconciliation, Verdict, reconcile};
use crate::schema::{Cell, CleanedTable, LogicalTable};

/// Configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Density detector settings.
    pub isolation: IsolationForestConfig,
    /// Reconstruction detector settings.
    pub autoencoder: AutoencoderConfig,
    /// Explicit feature columns per table (absent = every numeric column).
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_columns: BTreeMap<LogicalTable, Vec<String>>,
    /// Run the two detectors on separate threads.
    pub parallel_detectors: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            isolation: IsolationForestConfig::default(),
            autoencoder: AutoencoderConfig::default(),
            feature_columns: BTreeMap::new(),
            parallel_detectors: true,
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every nested setting.
    pub fn validate(&self) -> Result<()> {
        self.isolation.validate()?;
        self.autoencoder.validate()?;
        if let Some((table, _)) = self.feature_columns.iter().find(|(_, c)| c.is_empty()) {
            return Err(PipelineError::Config(format!(
                "feature column list for '{}' is empty",
                table
            )));
        }
        Ok(())
    }

    /// Set the isolation forest contamination.
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.isolation.contamination = contamination;
        self
    }

    /// Set the autoencoder error percentile.
    pub fn with_percentile(mut self, percentile: f64) -> Self {
        self.autoencoder.percentile = percentile;
        self
    }

    /// Set the autoencoder epochs.
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.autoencoder.epochs = epochs;
        self
    }

    /// Set the autoencoder learning rate.
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.autoencoder.learning_rate = learning_rate;
        self
    }

    /// Seed both detectors.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.isolation.seed = seed;
        self.autoencoder.seed = seed;
        self
    }

    /// Limit autoencoder training time.
    pub fn with_training_budget(mut self, budget: Duration) -> Self {
        self.autoencoder = self.autoencoder.with_training_budget(budget);
        self
    }

    /// Run detectors one after the other.
    pub fn with_parallel_detectors(mut self, parallel: bool) -> Self {
        self.parallel_detectors = parallel;
        self
    }

    /// Use explicit feature columns for one table.
    pub fn with_feature_columns<I, S>(mut self, table: LogicalTable, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_columns
            .insert(table, columns.into_iter().map(Into::into).collect());
        self
    }

    /// Projector settings for a table.
    pub fn projector_for(&self, table: LogicalTable) -> ProjectorConfig {
        ProjectorConfig {
            columns: self.feature_columns.get(&table).cloned(),
        }
    }
}

/// One matrix row with its verdict, aligned for a reporting consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictRow {
    /// Row position in the cleaned table.
    pub row_index: usize,
    /// Cleaned values of that row.
    pub values: IndexMap<String, Cell>,
    pub verdict: Verdict,
    pub pc1: f64,
    pub pc2: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconstruction_error: Option<f64>,
}

/// Everything one table's run produced.
#[derive(Debug, Clone, Serialize)]
pub struct TableRun {
    pub table: LogicalTable,
    pub cleaning: CleaningReport,
    pub cleaned: CleanedTable,
    pub matrix: StandardizedMatrix,
    pub projection: Projection,
    pub density: DetectorOutcome,
    pub reconstruction: DetectorOutcome,
    pub reconciliation: Reconciliation,
}

impl TableRun {
    /// Row-aligned verdicts joined with cleaned values and projection.
    pub fn verdict_rows(&self) -> Vec<VerdictRow> {
        (0..self.reconciliation.len())
            .filter_map(|row| self.verdict_row(row))
            .collect()
    }

    /// First `limit` rows with the given verdict.
    pub fn preview(&self, verdict: Verdict, limit: usize) -> Vec<VerdictRow> {
        self.reconciliation
            .indices(verdict)
            .into_iter()
            .take(limit)
            .filter_map(|row| self.verdict_row(row))
            .collect()
    }

    fn verdict_row(&self, row: usize) -> Option<VerdictRow> {
        let row_index = *self.matrix.row_indices.get(row)?;
        let [pc1, pc2] = self.projection.get(row).unwrap_or([0.0, 0.0]);
        Some(VerdictRow {
            row_index,
            values: self.cleaned.row_map(row_index)?,
            verdict: *self.reconciliation.verdicts.get(row)?,
            pc1,
            pc2,
            density_score: self.density.scores.get(row).copied(),
            reconstruction_error: self.reconstruction.scores.get(row).copied(),
        })
    }
}

/// Cleans a table, scores it with both detectors and reconciles them.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
    normalizer: TableNormalizer,
}

impl Pipeline {
    /// Create a pipeline with default configuration.
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Create a pipeline with custom configuration.
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            normalizer: TableNormalizer::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one table end to end.
    pub fn run_table<S: RowSource + ?Sized>(
        &self,
        source: &mut S,
        table: LogicalTable,
    ) -> Result<TableRun> {
        self.config.validate()?;

        let normalized = self.normalizer.clean(source, table)?;
        let projector = FeatureProjector::with_config(self.config.projector_for(table));
        let matrix = projector.project(&normalized.table)?;
        let projection = project_2d(&matrix);

        let (density, reconstruction) = self.detect(&matrix)?;
        let mut reconciliation = reconcile(&density.labels, &reconstruction.labels)?;
        reconciliation.summary = reconciliation
            .summary
            .with_degraded(density.degraded, reconstruction.degraded);

        let s = &reconciliation.summary;
        info!(
            table = %table,
            rows = s.total,
            normal = s.normal,
            agreed_anomaly = s.agreed_anomaly,
            density_only = s.density_only,
            reconstruction_only = s.reconstruction_only,
            "table reconciled"
        );

        Ok(TableRun {
            table,
            cleaning: normalized.report,
            cleaned: normalized.table,
            matrix,
            projection,
            density,
            reconstruction,
            reconciliation,
        })
    }

    /// Run every logical table. A failing table does not stop the others.
    pub fn run_all<S: RowSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Vec<(LogicalTable, Result<TableRun>)> {
        LogicalTable::ALL
            .iter()
            .map(|&table| {
                let result = self.run_table(source, table);
                if let Err(ref e) = result {
                    warn!(table = %table, error = %e, "table run failed");
                }
                (table, result)
            })
            .collect()
    }

    fn detect(&self, matrix: &StandardizedMatrix) -> Result<(DetectorOutcome, DetectorOutcome)> {
        let forest = IsolationForest::new(self.config.isolation.clone());
        let autoencoder = Autoencoder::new(self.config.autoencoder.clone());

        if !self.config.parallel_detectors {
            return Ok((forest.detect(matrix)?, autoencoder.detect(matrix)?));
        }

        let (density, reconstruction) = thread::scope(|scope| {
            let density = scope.spawn(|| forest.detect(matrix));
            let reconstruction = autoencoder.detect(matrix);
            let density = density
                .join()
                .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
            (density, reconstruction)
        });
        Ok((density?, reconstruction?))
    }
}
