//! Feature selection and standardization.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::schema::{CleanedTable, ColumnType, number_bits};

// =============================================================================
// STREAMING STATISTICS
// =============================================================================
// Welford's online algorithm for computing mean and variance in a single pass.

/// Streaming mean/variance accumulator using Welford's algorithm.
#[derive(Debug, Clone, Default)]
struct StreamingStats {
    count: usize,
    mean: f64,
    m2: f64, // Sum of squared differences from mean
}

impl StreamingStats {
    fn add(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Population variance, matching the usual standard scaler.
    fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    fn std(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// Fitted per-column scaling parameters.
///
/// Fitted on the matrix of one run; replaying it on later rows standardizes
/// them against that run's statistics, it does not update them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Scaler {
    /// Fit means and standard deviations on row-major data.
    pub fn fit(rows: &[Vec<f64>], width: usize) -> Self {
        let mut stats = vec![StreamingStats::default(); width];
        for row in rows {
            for (acc, &value) in stats.iter_mut().zip(row) {
                acc.add(value);
            }
        }

        Self {
            means: stats.iter().map(|s| s.mean).collect(),
            stds: stats.iter().map(StreamingStats::std).collect(),
        }
    }

    /// Standardize one row. Zero-variance columns map to 0.
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(&value, (&mean, &std))| {
                if std == 0.0 { 0.0 } else { (value - mean) / std }
            })
            .collect()
    }
}

/// Standardized numeric features of a cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StandardizedMatrix {
    /// Feature column names.
    pub columns: Vec<String>,
    /// Standardized values (row-major order).
    pub rows: Vec<Vec<f64>>,
    /// For each matrix row, the cleaned table row it came from.
    pub row_indices: Vec<usize>,
    /// Parameters the rows were standardized with.
    pub scaler: Scaler,
}

impl StandardizedMatrix {
    /// A matrix with columns but no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        let width = columns.len();
        Self {
            columns,
            rows: Vec::new(),
            row_indices: Vec::new(),
            scaler: Scaler {
                means: vec![0.0; width],
                stds: vec![0.0; width],
            },
        }
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of feature columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Configuration for feature projection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectorConfig {
    /// Explicit feature columns (None = every numeric column).
    pub columns: Option<Vec<String>>,
}

impl ProjectorConfig {
    /// Use an explicit list of feature columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// Turns a cleaned table into a standardized numeric matrix.
#[derive(Debug, Clone, Default)]
pub struct FeatureProjector {
    config: ProjectorConfig,
}

impl FeatureProjector {
    /// Create a projector over all numeric columns.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a projector with custom configuration.
    pub fn with_config(config: ProjectorConfig) -> Self {
        Self { config }
    }

    /// Select, filter, deduplicate and standardize the numeric features.
    ///
    /// Rows with a missing feature are skipped and repeated feature vectors
    /// keep only their first occurrence. Matrix rows stay in table order.
    /// An explicit feature column that is absent or not numeric is a schema
    /// error.
    pub fn project(&self, table: &CleanedTable) -> Result<StandardizedMatrix> {
        let positions = self.feature_positions(table)?;
        let columns: Vec<String> = positions
            .iter()
            .map(|&idx| table.columns[idx].name.clone())
            .collect();

        if positions.is_empty() {
            return Ok(StandardizedMatrix::empty(columns));
        }

        let mut seen: HashSet<Vec<u64>> = HashSet::new();
        let mut raw = Vec::new();
        let mut row_indices = Vec::new();
        let mut incomplete = 0usize;

        for (row_idx, row) in table.rows.iter().enumerate() {
            let values: Option<Vec<f64>> = positions.iter().map(|&idx| row[idx].as_f64()).collect();
            let Some(values) = values else {
                incomplete += 1;
                continue;
            };

            let key = values
                .iter()
                .map(|&v| number_bits(v))
                .collect();
            if seen.insert(key) {
                raw.push(values);
                row_indices.push(row_idx);
            }
        }

        let duplicates = table.row_count() - incomplete - raw.len();
        info!(
            table = %table.table,
            features = columns.len(),
            rows = raw.len(),
            incomplete,
            duplicates,
            "projected features"
        );

        if raw.is_empty() {
            return Ok(StandardizedMatrix::empty(columns));
        }

        let scaler = Scaler::fit(&raw, columns.len());
        let rows = raw.iter().map(|r| scaler.transform(r)).collect();

        Ok(StandardizedMatrix {
            columns,
            rows,
            row_indices,
            scaler,
        })
    }

    fn feature_positions(&self, table: &CleanedTable) -> Result<Vec<usize>> {
        let Some(ref wanted) = self.config.columns else {
            return Ok(table
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| c.column_type == ColumnType::Numeric)
                .map(|(idx, _)| idx)
                .collect());
        };

        wanted
            .iter()
            .map(|name| {
                table
                    .column_index(name)
                    .filter(|&idx| table.columns[idx].column_type == ColumnType::Numeric)
                    .ok_or_else(|| PipelineError::schema(table.table.as_str(), name.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cell, ColumnSpec, LogicalTable};

    fn table(rows: Vec<Vec<Cell>>) -> CleanedTable {
        CleanedTable::new(
            LogicalTable::Tailles,
            vec![
                ColumnSpec::new("IdTaille", ColumnType::Numeric),
                ColumnSpec::new("LibTaille", ColumnType::Text),
                ColumnSpec::new("Ordre", ColumnType::Numeric),
            ],
            rows,
        )
    }

    fn row(id: f64, lib: &str, ordre: Option<f64>) -> Vec<Cell> {
        vec![
            Cell::Number(id),
            Cell::Text(lib.into()),
            ordre.map(Cell::Number).unwrap_or(Cell::Null),
        ]
    }

    #[test]
    fn test_standardizes_to_zero_mean_unit_variance() {
        let t = table(vec![
            row(1.0, "S", Some(10.0)),
            row(2.0, "M", Some(20.0)),
            row(3.0, "L", Some(30.0)),
            row(4.0, "XL", Some(40.0)),
        ]);
        let m = FeatureProjector::new().project(&t).unwrap();

        assert_eq!(m.columns, vec!["IdTaille", "Ordre"]);
        assert_eq!(m.row_count(), 4);
        for col in 0..2 {
            let mean: f64 = m.rows.iter().map(|r| r[col]).sum::<f64>() / 4.0;
            let var: f64 = m.rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_drops_incomplete_and_duplicate_feature_rows() {
        let t = table(vec![
            row(1.0, "S", Some(10.0)),
            row(2.0, "M", None),
            row(1.0, "S bis", Some(10.0)),
            row(3.0, "L", Some(30.0)),
        ]);
        let m = FeatureProjector::new().project(&t).unwrap();
        assert_eq!(m.row_indices, vec![0, 3]);
    }

    #[test]
    fn test_zero_variance_column_maps_to_zero() {
        let t = table(vec![row(1.0, "S", Some(5.0)), row(2.0, "M", Some(5.0))]);
        let m = FeatureProjector::new().project(&t).unwrap();
        assert!(m.rows.iter().all(|r| r[1] == 0.0 && r[0].is_finite()));
    }

    #[test]
    fn test_empty_table_gives_empty_matrix() {
        let m = FeatureProjector::new().project(&table(Vec::new())).unwrap();
        assert!(m.is_empty());
        assert_eq!(m.column_count(), 2);
    }

    #[test]
    fn test_explicit_columns() {
        let t = table(vec![row(1.0, "S", None), row(2.0, "M", None)]);
        let config = ProjectorConfig::default().with_columns(["IdTaille"]);
        let m = FeatureProjector::with_config(config).project(&t).unwrap();
        assert_eq!(m.row_count(), 2);

        let bad = ProjectorConfig::default().with_columns(["LibTaille"]);
        assert!(matches!(
            FeatureProjector::with_config(bad).project(&t),
            Err(PipelineError::Schema { .. })
        ));

        let missing = ProjectorConfig::default().with_columns(["Poids"]);
        assert!(matches!(
            FeatureProjector::with_config(missing).project(&t),
            Err(PipelineError::Schema { .. })
        ));
    }

    #[test]
    fn test_scaler_replay() {
        let t = table(vec![row(0.0, "S", Some(0.0)), row(2.0, "M", Some(4.0))]);
        let m = FeatureProjector::new().project(&t).unwrap();
        assert_eq!(m.scaler.means, vec![1.0, 2.0]);
        assert_eq!(m.scaler.transform(&[3.0, 6.0]), vec![2.0, 2.0]);
    }
}
