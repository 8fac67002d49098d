//! CLI command implementations.

pub mod annotate;
pub mod clean;
pub mod detect;
pub mod status;

use std::path::Path;

use cleanscan::{CsvDirectorySource, LogicalTable};

/// The requested table, or every table the source directory has an export for.
pub fn selected_tables(
    source: &CsvDirectorySource,
    table: Option<LogicalTable>,
) -> Result<Vec<LogicalTable>, Box<dyn std::error::Error>> {
    if let Some(table) = table {
        return Ok(vec![table]);
    }
    let tables = source.available_tables();
    if tables.is_empty() {
        return Err("No <table>.csv exports found in the source directory".into());
    }
    Ok(tables)
}

/// Create an output directory if needed.
pub fn ensure_dir(dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create '{}': {}", dir.display(), e))?;
    }
    Ok(())
}
