//! Append-only store of manual labels, keyed by a row's business key.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::schema::CleanedTable;

/// A manual judgement on one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal = 0,
    Anomaly = 1,
}

impl Label {
    /// Numeric code as stored.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Label for a stored code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Label::Normal),
            1 => Ok(Label::Anomaly),
            other => Err(PipelineError::Persistence(format!("Invalid label code {}", other))),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Normal => write!(f, "normal"),
            Label::Anomaly => write!(f, "anomaly"),
        }
    }
}

impl FromStr for Label {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "0" | "normal" => Ok(Label::Normal),
            "1" | "anomaly" => Ok(Label::Anomaly),
            other => Err(PipelineError::Persistence(format!("Invalid label '{}'", other))),
        }
    }
}

/// One stored annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub key: String,
    pub label: Label,
    pub annotated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnnotationRecord {
    key: String,
    label: u8,
    annotated_at: DateTime<Utc>,
}

/// Append-only label file with columns `key,label,annotated_at`.
///
/// Records are never rewritten: every [`AnnotationStore::append`] adds one
/// line, and a key can be labeled only once.
#[derive(Debug)]
pub struct AnnotationStore {
    path: PathBuf,
    annotations: Vec<Annotation>,
    index: HashMap<String, usize>,
}

impl AnnotationStore {
    /// Open a store, loading existing records. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self {
            path,
            annotations: Vec::new(),
            index: HashMap::new(),
        };

        if store.path.exists() {
            let mut reader = csv::Reader::from_path(&store.path).map_err(|e| {
                PipelineError::Persistence(format!(
                    "Failed to open annotation store '{}': {}",
                    store.path.display(),
                    e
                ))
            })?;
            for record in reader.deserialize::<AnnotationRecord>() {
                let record = record.map_err(|e| {
                    PipelineError::Persistence(format!(
                        "Failed to parse annotation store '{}': {}",
                        store.path.display(),
                        e
                    ))
                })?;
                let label = Label::from_code(record.label)?;
                store.insert(Annotation {
                    key: record.key,
                    label,
                    annotated_at: record.annotated_at,
                })?;
            }
        }

        debug!(path = %store.path.display(), annotations = store.len(), "opened annotation store");
        Ok(store)
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a label for a key and persist it.
    pub fn append(&mut self, key: impl Into<String>, label: Label) -> Result<&Annotation> {
        let key = key.into();
        if self.index.contains_key(&key) {
            return Err(PipelineError::DuplicateAnnotation(key));
        }

        let annotation = Annotation {
            key,
            label,
            annotated_at: Utc::now(),
        };
        self.write_record(&annotation)?;
        info!(key = %annotation.key, label = %annotation.label, "annotation recorded");

        let idx = self.insert(annotation)?;
        Ok(&self.annotations[idx])
    }

    /// Label recorded for a key.
    pub fn label(&self, key: &str) -> Option<Label> {
        self.index.get(key).map(|&idx| self.annotations[idx].label)
    }

    /// All annotations in recording order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Get the number of annotations.
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Whether nothing has been annotated yet.
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Number of annotations with a given label.
    pub fn count(&self, label: Label) -> usize {
        self.annotations.iter().filter(|a| a.label == label).count()
    }

    /// First row of the table whose key has no label yet.
    ///
    /// Rows with an empty key are skipped.
    pub fn next_unlabeled(&self, table: &CleanedTable, key_column: &str) -> Result<Option<usize>> {
        let col = table
            .column_index(key_column)
            .ok_or_else(|| PipelineError::schema(table.table.as_str(), key_column))?;

        Ok(table.rows.iter().position(|row| {
            let key = row[col].to_text();
            !key.is_empty() && !self.index.contains_key(&key)
        }))
    }

    fn insert(&mut self, annotation: Annotation) -> Result<usize> {
        if self.index.contains_key(&annotation.key) {
            return Err(PipelineError::DuplicateAnnotation(annotation.key));
        }
        let idx = self.annotations.len();
        self.index.insert(annotation.key.clone(), idx);
        self.annotations.push(annotation);
        Ok(idx)
    }

    fn write_record(&self, annotation: &Annotation) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    PipelineError::Persistence(format!(
                        "Failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PipelineError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(AnnotationRecord {
            key: annotation.key.clone(),
            label: annotation.label.code(),
            annotated_at: annotation.annotated_at,
        })?;
        writer.flush().map_err(|e| PipelineError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Cell, ColumnSpec, ColumnType, LogicalTable};
    use tempfile::TempDir;

    fn suppliers() -> CleanedTable {
        CleanedTable::new(
            LogicalTable::Fournisseur,
            vec![
                ColumnSpec::new("IDFournisseur", ColumnType::Numeric),
                ColumnSpec::new("Fournisseur", ColumnType::Text),
            ],
            vec![
                vec![Cell::Number(10.0), Cell::Text("Alpha".into())],
                vec![Cell::Number(11.0), Cell::Text("Beta".into())],
                vec![Cell::Number(12.0), Cell::Text("Gamma".into())],
            ],
        )
    }

    #[test]
    fn test_append_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labels.csv");

        let mut store = AnnotationStore::open(&path).unwrap();
        assert!(store.is_empty());
        store.append("10", Label::Normal).unwrap();
        store.append("11", Label::Anomaly).unwrap();

        let reopened = AnnotationStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.label("11"), Some(Label::Anomaly));
        assert_eq!(reopened.label("12"), None);
        assert_eq!(reopened.count(Label::Normal), 1);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("key,label,annotated_at\n"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = AnnotationStore::open(dir.path().join("labels.csv")).unwrap();
        store.append("10", Label::Normal).unwrap();
        assert!(matches!(
            store.append("10", Label::Anomaly),
            Err(PipelineError::DuplicateAnnotation(_))
        ));
        assert_eq!(store.label("10"), Some(Label::Normal));
    }

    #[test]
    fn test_next_unlabeled() {
        let dir = TempDir::new().unwrap();
        let mut store = AnnotationStore::open(dir.path().join("labels.csv")).unwrap();
        let table = suppliers();

        assert_eq!(store.next_unlabeled(&table, "IDFournisseur").unwrap(), Some(0));
        store.append("10", Label::Normal).unwrap();
        store.append("12", Label::Normal).unwrap();
        assert_eq!(store.next_unlabeled(&table, "IDFournisseur").unwrap(), Some(1));
        store.append("11", Label::Anomaly).unwrap();
        assert_eq!(store.next_unlabeled(&table, "IDFournisseur").unwrap(), None);

        assert!(matches!(
            store.next_unlabeled(&table, "Code"),
            Err(PipelineError::Schema { .. })
        ));
    }

    #[test]
    fn test_label_parse() {
        assert_eq!("1".parse::<Label>().unwrap(), Label::Anomaly);
        assert_eq!(" Normal ".parse::<Label>().unwrap(), Label::Normal);
        assert!("maybe".parse::<Label>().is_err());
        assert_eq!(Label::Anomaly.code(), 1);
    }
}
