//! The cleaned, typed table produced by the normalizer.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;
use crate::input::{RawRow, RawValue};

use super::column::{Cell, ColumnSpec};
use super::types::{ColumnType, LogicalTable};

/// A rectangular, schema-typed table.
///
/// Produced once per run by the normalizer and not modified afterwards.
/// Row positions are the row indices every later stage refers to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedTable {
    /// Logical table the rows came from.
    pub table: LogicalTable,
    /// Column schema, in storage order.
    pub columns: Vec<ColumnSpec>,
    /// Row data (row-major order), one cell per column.
    pub rows: Vec<Vec<Cell>>,
}

impl CleanedTable {
    /// Create a table from columns and rows.
    pub fn new(table: LogicalTable, columns: Vec<ColumnSpec>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            table,
            columns,
            rows,
        }
    }

    /// Create a table with a schema and no rows.
    pub fn empty(table: LogicalTable, columns: Vec<ColumnSpec>) -> Self {
        Self::new(table, columns, Vec::new())
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Get all values for a column by index.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Get a column by name.
    pub fn column_by_name(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.column_index(name)?;
        Some(self.column_values(index).collect())
    }

    /// Get a specific cell value.
    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Names of the columns declared numeric.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.column_type == ColumnType::Numeric)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// One row keyed by column name.
    pub fn row_map(&self, row: usize) -> Option<IndexMap<String, Cell>> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .zip(cells)
                .map(|(c, v)| (c.name.clone(), v.clone()))
                .collect(),
        )
    }

    /// Convert back to raw rows, e.g. to normalize an already-clean table again.
    ///
    /// Numbers stay numbers, dates become text in [`super::DATE_FORMAT`].
    pub fn to_raw_rows(&self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, cell)| {
                        let value = match cell {
                            Cell::Null => RawValue::Null,
                            Cell::Number(n) => RawValue::Number(*n),
                            Cell::Date(_) | Cell::Text(_) => RawValue::Text(cell.to_text()),
                        };
                        (c.name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }

    /// Write the table as CSV with a header row. Missing cells are empty.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in &self.rows {
            writer.write_record(row.iter().map(Cell::to_text))?;
        }
        writer.flush().map_err(|e| crate::error::PipelineError::Io {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> CleanedTable {
        CleanedTable::new(
            LogicalTable::Saison,
            vec![
                ColumnSpec::new("IDSaison", ColumnType::Numeric),
                ColumnSpec::new("Saison", ColumnType::Text),
                ColumnSpec::new("Etat", ColumnType::Numeric),
            ],
            vec![
                vec![Cell::Number(1.0), Cell::Text("Ete".into()), Cell::Number(1.0)],
                vec![Cell::Number(2.0), Cell::Null, Cell::Number(0.0)],
            ],
        )
    }

    #[test]
    fn test_accessors() {
        let table = sample();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_index("Etat"), Some(2));
        assert_eq!(table.numeric_columns(), vec!["IDSaison", "Etat"]);
        assert_eq!(table.get(1, 1), Some(&Cell::Null));
        let row = table.row_map(0).unwrap();
        assert_eq!(row["Saison"], Cell::Text("Ete".into()));
    }

    #[test]
    fn test_to_raw_rows() {
        let raw = sample().to_raw_rows();
        assert_eq!(raw[0]["IDSaison"], RawValue::Number(1.0));
        assert_eq!(raw[1]["Saison"], RawValue::Null);
    }

    #[test]
    fn test_write_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saison.csv");
        sample().write_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "IDSaison,Saison,Etat\n1,Ete,1\n2,,0\n");
    }
}
