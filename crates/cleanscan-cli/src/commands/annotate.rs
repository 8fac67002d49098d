//! Annotate commands - show the next unlabeled row, record a label.

use std::path::PathBuf;

use cleanscan::{AnnotationStore, CsvDirectorySource, Label, LogicalTable, TableNormalizer};
use colored::Colorize;

pub fn next(
    source_dir: PathBuf,
    store_path: PathBuf,
    table: LogicalTable,
    key: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = CsvDirectorySource::new(&source_dir);
    let cleaned = TableNormalizer::new().clean(&mut source, table)?.table;
    let store = AnnotationStore::open(&store_path)?;

    let Some(row) = store.next_unlabeled(&cleaned, &key)? else {
        println!(
            "{} all {} rows of {} are labeled",
            "Done:".green().bold(),
            cleaned.row_count(),
            table
        );
        return Ok(());
    };

    let values = cleaned.row_map(row).unwrap_or_default();
    let key_value = values.get(&key).map(|v| v.to_text()).unwrap_or_default();

    println!(
        "{} {} = {} (row {} of {})",
        "Next:".cyan().bold(),
        key,
        key_value.white().bold(),
        row + 1,
        cleaned.row_count()
    );
    println!();
    for (column, value) in &values {
        println!("  {} {}", format!("{:<24}", column).dimmed(), value.to_text());
    }
    println!();
    println!(
        "Label it with: cleanscan annotate label --store {} --key-value {} --anomaly|--normal",
        store_path.display(),
        key_value
    );
    Ok(())
}

pub fn label(
    store_path: PathBuf,
    key_value: String,
    anomaly: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = AnnotationStore::open(&store_path)?;
    let label = if anomaly { Label::Anomaly } else { Label::Normal };
    store.append(key_value.as_str(), label)?;

    let shown = match label {
        Label::Anomaly => "anomaly".red().bold(),
        Label::Normal => "normal".green().bold(),
    };
    println!(
        "{} {} as {} ({} labeled)",
        "Recorded".cyan(),
        key_value.white(),
        shown,
        store.len()
    );
    Ok(())
}
