//! Detect command - run the full pipeline and report verdicts.

use std::path::{Path, PathBuf};

use cleanscan::{CsvDirectorySource, LogicalTable, Pipeline, PipelineConfig, TableRun, Verdict};
use colored::Colorize;

use super::{ensure_dir, selected_tables};

const PREVIEW_ROWS: usize = 5;

/// Arguments of the detect command.
pub struct DetectArgs {
    pub source: PathBuf,
    pub table: Option<LogicalTable>,
    pub config: Option<PathBuf>,
    pub contamination: Option<f64>,
    pub percentile: Option<f64>,
    pub epochs: Option<usize>,
    pub learning_rate: Option<f64>,
    pub seed: Option<u64>,
    pub output: Option<PathBuf>,
}

impl DetectArgs {
    /// Config file values with command-line overrides applied.
    fn pipeline_config(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = match self.config {
            Some(ref path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        if let Some(c) = self.contamination {
            config = config.with_contamination(c);
        }
        if let Some(p) = self.percentile {
            config = config.with_percentile(p);
        }
        if let Some(e) = self.epochs {
            config = config.with_epochs(e);
        }
        if let Some(lr) = self.learning_rate {
            config = config.with_learning_rate(lr);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

pub fn run(args: DetectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::with_config(args.pipeline_config()?);
    let mut source = CsvDirectorySource::new(&args.source);
    let tables = selected_tables(&source, args.table)?;

    if let Some(ref dir) = args.output {
        ensure_dir(dir)?;
    }

    let mut failures = 0;
    for table in tables {
        match pipeline.run_table(&mut source, table) {
            Ok(run) => {
                print_run(&run);
                if let Some(ref dir) = args.output {
                    write_outputs(&run, dir)?;
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}: {}", "Failed".red().bold(), table, e);
            }
        }
        println!();
    }

    if failures > 0 {
        return Err(format!("{} table(s) failed", failures).into());
    }
    Ok(())
}

fn print_run(run: &TableRun) {
    let s = &run.reconciliation.summary;
    println!(
        "{} {} ({} rows cleaned, {} scored)",
        "Table".cyan().bold(),
        run.table.to_string().white().bold(),
        run.cleaning.rows_kept,
        s.total
    );

    if s.total == 0 {
        println!("  {}", "Nothing to score".dimmed());
        return;
    }

    println!("  Normal:              {}", s.normal.to_string().green());
    println!("  Agreed anomaly:      {}", s.agreed_anomaly.to_string().red().bold());
    println!("  Isolation only:      {}", s.density_only.to_string().yellow());
    println!("  Autoencoder only:    {}", s.reconstruction_only.to_string().yellow());
    println!("  Agreement:           {:.1}%", s.agreement_rate());

    if s.density_degraded {
        println!("  {}", "Isolation forest fell back to all-normal labels".red());
    }
    if s.reconstruction_degraded {
        println!("  {}", "Autoencoder training diverged; labels fell back to normal".red());
    }

    let agreed = run.preview(Verdict::AgreedAnomaly, PREVIEW_ROWS);
    if !agreed.is_empty() {
        println!("  {}", "First agreed anomalies:".yellow().bold());
        for row in agreed {
            let values: Vec<String> = row
                .values
                .iter()
                .take(4)
                .map(|(k, v)| format!("{}={}", k, v.to_text()))
                .collect();
            println!("    row {:>5}  {}", row.row_index, values.join("  ").dimmed());
        }
    }
}

fn write_outputs(run: &TableRun, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let report = serde_json::json!({
        "table": run.table,
        "cleaning": run.cleaning,
        "features": run.matrix.columns,
        "summary": run.reconciliation.summary,
        "density_threshold": run.density.threshold,
        "reconstruction_threshold": run.reconstruction.threshold,
        "explained_variance": run.projection.explained_variance,
    });
    std::fs::write(
        dir.join(format!("{}.report.json", run.table)),
        serde_json::to_string_pretty(&report)?,
    )?;

    let mut writer = csv::Writer::from_path(dir.join(format!("{}.verdicts.csv", run.table)))?;
    let mut header = vec![
        "row_index".to_string(),
        "verdict".to_string(),
        "pc1".to_string(),
        "pc2".to_string(),
        "density_score".to_string(),
        "reconstruction_error".to_string(),
    ];
    header.extend(run.cleaned.columns.iter().map(|c| c.name.clone()));
    writer.write_record(&header)?;

    let optional = |v: Option<f64>| v.map(|x| x.to_string()).unwrap_or_default();
    for row in run.verdict_rows() {
        let mut record = vec![
            row.row_index.to_string(),
            row.verdict.to_string(),
            row.pc1.to_string(),
            row.pc2.to_string(),
            optional(row.density_score),
            optional(row.reconstruction_error),
        ];
        record.extend(row.values.values().map(|v| v.to_text()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
