//! Status command - show annotation progress for a table.

use std::path::PathBuf;

use cleanscan::{AnnotationStore, CsvDirectorySource, Label, LogicalTable, TableNormalizer};
use colored::Colorize;

pub fn run(
    source_dir: PathBuf,
    store_path: PathBuf,
    table: LogicalTable,
    key: String,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = CsvDirectorySource::new(&source_dir);
    let cleaned = TableNormalizer::new().clean(&mut source, table)?.table;
    let store = AnnotationStore::open(&store_path)?;

    let col = cleaned
        .column_index(&key)
        .ok_or_else(|| format!("Column '{}' not found in table '{}'", key, table))?;

    // Only labels whose key is still present in the cleaned table count.
    let (mut normal, mut anomaly) = (0usize, 0usize);
    for cell in cleaned.column_values(col) {
        match store.label(&cell.to_text()) {
            Some(Label::Normal) => normal += 1,
            Some(Label::Anomaly) => anomaly += 1,
            None => {}
        }
    }
    let total = cleaned.row_count();
    let labeled = normal + anomaly;
    let progress = if total == 0 { 1.0 } else { labeled as f64 / total as f64 };
    let next = store.next_unlabeled(&cleaned, &key)?;

    if json_output {
        let status = serde_json::json!({
            "table": table,
            "key": key,
            "store": store_path,
            "rows": total,
            "labeled": labeled,
            "normal": normal,
            "anomaly": anomaly,
            "progress": progress,
            "next_row": next,
            "is_complete": next.is_none(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Annotation status for".cyan().bold(),
        table.to_string().white()
    );
    println!();

    let bar_width = 30;
    let filled = (progress * bar_width as f64).round() as usize;
    let bar: String = "█".repeat(filled) + &"░".repeat(bar_width - filled);
    println!(
        "Progress: {} {}/{} ({:.0}%)",
        bar.cyan(),
        labeled.to_string().white().bold(),
        total,
        progress * 100.0
    );
    println!();

    println!("{}", "Labels:".yellow().bold());
    println!("  Normal:  {}", normal.to_string().green());
    println!("  Anomaly: {}", anomaly.to_string().red());
    if store.len() > labeled {
        println!(
            "  {}",
            format!("{} stored keys not in the cleaned table", store.len() - labeled).dimmed()
        );
    }
    println!();

    match next {
        Some(row) => println!("Next unlabeled row: {}", (row + 1).to_string().white().bold()),
        None => println!("{}", "All rows labeled".green().bold()),
    }
    Ok(())
}
