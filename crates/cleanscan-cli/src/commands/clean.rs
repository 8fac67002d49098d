//! Clean command - normalize table exports and write cleaned CSVs.

use std::path::PathBuf;

use cleanscan::{CleaningReport, CsvDirectorySource, LogicalTable, TableNormalizer};
use colored::Colorize;
use indexmap::IndexMap;

use super::{ensure_dir, selected_tables};

pub fn run(
    source_dir: PathBuf,
    table: Option<LogicalTable>,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = CsvDirectorySource::new(&source_dir);
    let tables = selected_tables(&source, table)?;
    ensure_dir(&output)?;

    println!(
        "{} {}",
        "Cleaning exports in".cyan().bold(),
        source_dir.display().to_string().white()
    );
    println!();

    let normalizer = TableNormalizer::new();
    let mut reports: IndexMap<LogicalTable, CleaningReport> = IndexMap::new();

    for table in tables {
        let normalized = normalizer.clean(&mut source, table)?;
        let path = output.join(format!("{}.csv", table));
        normalized.table.write_csv(&path)?;

        let report = &normalized.report;
        println!(
            "  {} {:>6} fetched  {} kept  {} dropped  ({:.1}% retained)",
            format!("{:<12}", table).white().bold(),
            report.rows_fetched,
            format!("{:>6}", report.rows_kept).green(),
            format!("{:>6}", report.dropped.total()).red(),
            report.retention()
        );
        let d = &report.dropped;
        for (label, count) in [
            ("missing critical", d.missing_critical),
            ("invalid flag", d.invalid_flag),
            ("non-positive", d.non_positive),
            ("out of range", d.out_of_range),
            ("duplicate", d.duplicate),
        ] {
            if count > 0 {
                println!("      {} {}", format!("{:>6}", count).dimmed(), label);
            }
        }

        reports.insert(table, normalized.report);
    }

    let report_path = output.join("cleaning_report.json");
    std::fs::write(&report_path, serde_json::to_string_pretty(&reports)?)?;

    println!();
    println!(
        "{} {}",
        "Cleaned tables written to".green(),
        output.display()
    );
    Ok(())
}
