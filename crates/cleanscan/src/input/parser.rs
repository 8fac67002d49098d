//! CSV export reader with delimiter detection.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::schema::LogicalTable;

use super::source::{RawRow, RawValue, RowSource, SourceMetadata};

/// Delimiters to try when auto-detecting.
const DELIMITERS: &[u8] = &[b'\t', b',', b';', b'|'];

/// Marker MySQL writes for NULL in `SELECT ... INTO OUTFILE` exports.
const MYSQL_NULL: &str = "\\N";

/// Reads `<dir>/<table>.csv` exports, one file per logical table.
///
/// Each fetch opens, reads and closes its file; nothing is held between
/// fetches.
#[derive(Debug, Clone)]
pub struct CsvDirectorySource {
    dir: PathBuf,
    /// Delimiter to use (None = auto-detect).
    delimiter: Option<u8>,
    metadata: HashMap<LogicalTable, SourceMetadata>,
}

impl CsvDirectorySource {
    /// Create a source rooted at a directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            delimiter: None,
            metadata: HashMap::new(),
        }
    }

    /// Use a fixed delimiter instead of auto-detection.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    /// Path of the export for a table.
    pub fn table_path(&self, table: LogicalTable) -> PathBuf {
        self.dir.join(format!("{}.csv", table.as_str()))
    }

    /// Metadata recorded by the last fetch of a table.
    pub fn metadata(&self, table: LogicalTable) -> Option<&SourceMetadata> {
        self.metadata.get(&table)
    }

    /// Tables whose export file exists in the directory.
    pub fn available_tables(&self) -> Vec<LogicalTable> {
        LogicalTable::ALL
            .iter()
            .copied()
            .filter(|t| self.table_path(*t).is_file())
            .collect()
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(path).map_err(|e| PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(|e| PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(contents)
    }
}

impl RowSource for CsvDirectorySource {
    fn fetch(&mut self, table: LogicalTable) -> Result<Vec<RawRow>> {
        let path = self.table_path(table);
        let contents = self.read_file(&path)?;

        let mut hasher = Sha256::new();
        hasher.update(&contents);
        let hash = format!("sha256:{:x}", hasher.finalize());

        let delimiter = match self.delimiter {
            Some(d) => d,
            None => detect_delimiter(&contents).unwrap_or(b','),
        };

        let (headers, rows) = parse_bytes(&contents, delimiter)?;
        debug!(
            "fetched {} rows x {} columns from {}",
            rows.len(),
            headers.len(),
            path.display()
        );

        let metadata = SourceMetadata::new(
            path,
            hash,
            contents.len() as u64,
            delimiter,
            rows.len(),
            headers.len(),
        );
        self.metadata.insert(table, metadata);

        Ok(rows)
    }
}

/// Parse delimited bytes into a header and raw rows.
///
/// Every cell is kept as text; short rows are padded with nulls and long rows
/// truncated to the header width.
pub fn parse_bytes(bytes: &[u8], delimiter: u8) -> Result<(Vec<String>, Vec<RawRow>)> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row = RawRow::with_capacity(headers.len());
        for (idx, header) in headers.iter().enumerate() {
            let value = match record.get(idx) {
                None => RawValue::Null,
                Some(MYSQL_NULL) => RawValue::Null,
                Some(text) => RawValue::Text(text.to_string()),
            };
            row.insert(header.clone(), value);
        }
        rows.push(row);
    }

    Ok((headers, rows))
}

/// Detect the delimiter by analyzing the first few lines.
fn detect_delimiter(bytes: &[u8]) -> Option<u8> {
    let reader = BufReader::new(bytes);
    let lines: Vec<String> = reader
        .lines()
        .take(10)
        .filter_map(|l| l.ok())
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return None;
    }

    let mut best_delimiter = None;
    let mut best_score = 0;

    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_delimiter_in_line(line, delim))
            .collect();

        let first_count = counts[0];
        if first_count == 0 {
            continue;
        }

        // Consistent column counts across lines win; tab gets a small bonus
        // since it rarely appears inside values.
        let consistent = counts.iter().all(|&c| c == first_count);
        let score = if consistent {
            first_count * 1000 + if delim == b'\t' { 100 } else { 0 }
        } else {
            first_count
        };

        if score > best_score {
            best_score = score;
            best_delimiter = Some(delim);
        }
    }

    best_delimiter
}

/// Count delimiter occurrences in a line, respecting quotes.
fn count_delimiter_in_line(line: &str, delimiter: u8) -> usize {
    let delim_char = delimiter as char;
    let mut count = 0;
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delim_char && !in_quotes => count += 1,
            _ => {}
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter(b"a,b,c\n1,2,3\n4,5,6"), Some(b','));
        assert_eq!(detect_delimiter(b"a\tb\tc\n1\t2\t3"), Some(b'\t'));
        assert_eq!(detect_delimiter(b"a;b\n1;\"2;3\""), Some(b';'));
        assert_eq!(detect_delimiter(b"single\nvalue"), None);
    }

    #[test]
    fn test_parse_bytes_pads_and_maps_null_marker() {
        let (headers, rows) = parse_bytes(b"IDSaison,Saison,Code\n1,Ete,\\N\n2\n", b',').unwrap();
        assert_eq!(headers, vec!["IDSaison", "Saison", "Code"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Saison"], RawValue::Text("Ete".into()));
        assert_eq!(rows[0]["Code"], RawValue::Null);
        assert_eq!(rows[1]["Saison"], RawValue::Null);
    }

    #[test]
    fn test_parse_empty_file() {
        let (headers, rows) = parse_bytes(b"  \n", b',').unwrap();
        assert!(headers.is_empty());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_directory_source_fetch() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("saison.csv"),
            "IDSaison;Saison;Code;Etat\n1;Ete 2023;E23;1\n2;Hiver 2023;H23;0\n",
        )
        .unwrap();

        let mut source = CsvDirectorySource::new(dir.path());
        assert_eq!(source.available_tables(), vec![LogicalTable::Saison]);

        let rows = source.fetch(LogicalTable::Saison).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["Code"], RawValue::Text("H23".into()));

        let meta = source.metadata(LogicalTable::Saison).unwrap();
        assert_eq!(meta.file, "saison.csv");
        assert_eq!(meta.delimiter, ";");
        assert_eq!(meta.row_count, 2);
        assert!(meta.hash.starts_with("sha256:"));
    }

    #[test]
    fn test_missing_export_is_io_error() {
        let dir = TempDir::new().unwrap();
        let mut source = CsvDirectorySource::new(dir.path());
        let err = source.fetch(LogicalTable::Article).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
