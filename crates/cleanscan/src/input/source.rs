//! Raw row model and the row source abstraction.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::LogicalTable;

/// An untyped scalar as retrieved from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(f64),
    Text(String),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(RawValue::Null)
    }
}

/// One row as fetched: column name to value, in storage column order.
pub type RawRow = IndexMap<String, RawValue>;

/// Build a raw row from `(column, value)` pairs.
pub fn raw_row<K, V, I>(pairs: I) -> RawRow
where
    K: Into<String>,
    V: Into<RawValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Supplies the raw rows of a logical table.
///
/// Implementations own their connection or file handles. The pipeline only
/// borrows a source for the duration of one fetch.
pub trait RowSource {
    /// Fetch every row of a table.
    fn fetch(&mut self, table: LogicalTable) -> Result<Vec<RawRow>>;
}

/// Row source backed by rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    tables: HashMap<LogicalTable, Vec<RawRow>>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows for a table, replacing any previous rows.
    pub fn with_table(mut self, table: LogicalTable, rows: Vec<RawRow>) -> Self {
        self.insert(table, rows);
        self
    }

    /// Set rows for a table.
    pub fn insert(&mut self, table: LogicalTable, rows: Vec<RawRow>) {
        self.tables.insert(table, rows);
    }
}

impl RowSource for MemorySource {
    fn fetch(&mut self, table: LogicalTable) -> Result<Vec<RawRow>> {
        Ok(self.tables.get(&table).cloned().unwrap_or_default())
    }
}

/// Metadata about a fetched table export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// SHA-256 hash of the file contents.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected delimiter as a display string.
    pub delimiter: String,
    /// Number of data rows (excluding header).
    pub row_count: usize,
    /// Number of columns.
    pub column_count: usize,
    /// When the fetch happened.
    pub fetched_at: DateTime<Utc>,
}

impl SourceMetadata {
    /// Create metadata for a file that has been read.
    pub fn new(
        path: PathBuf,
        hash: String,
        size_bytes: u64,
        delimiter: u8,
        row_count: usize,
        column_count: usize,
    ) -> Self {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let delimiter = match delimiter {
            b'\t' => "tab".to_string(),
            other => (other as char).to_string(),
        };

        Self {
            file,
            path,
            hash,
            size_bytes,
            delimiter,
            row_count,
            column_count,
            fetched_at: Utc::now(),
        }
    }
}
