//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use cleanscan::LogicalTable;
use std::path::PathBuf;

/// cleanscan: clean relational table exports and flag anomalous rows
#[derive(Parser)]
#[command(name = "cleanscan")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clean table exports and write the cleaned CSVs with a drop report
    Clean {
        /// Directory holding <table>.csv exports
        #[arg(short, long, value_name = "DIR")]
        source: PathBuf,

        /// Only this table (default: every table found in the source)
        #[arg(short, long)]
        table: Option<LogicalTable>,

        /// Output directory
        #[arg(short, long, default_value = "cleaned")]
        output: PathBuf,
    },

    /// Clean, score with both detectors and reconcile their verdicts
    Detect {
        /// Directory holding <table>.csv exports
        #[arg(short, long, value_name = "DIR")]
        source: PathBuf,

        /// Only this table (default: every table found in the source)
        #[arg(short, long)]
        table: Option<LogicalTable>,

        /// JSON pipeline configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Expected anomaly fraction for the isolation forest
        #[arg(long)]
        contamination: Option<f64>,

        /// Reconstruction error percentile for the autoencoder
        #[arg(long)]
        percentile: Option<f64>,

        /// Autoencoder training epochs
        #[arg(long)]
        epochs: Option<usize>,

        /// Autoencoder learning rate
        #[arg(long)]
        learning_rate: Option<f64>,

        /// Seed for both detectors
        #[arg(long)]
        seed: Option<u64>,

        /// Directory for JSON reports and verdict CSVs
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Label rows by hand
    Annotate {
        #[command(subcommand)]
        action: AnnotateCommand,
    },

    /// Show annotation progress for a table
    Status {
        /// Directory holding <table>.csv exports
        #[arg(short, long, value_name = "DIR")]
        source: PathBuf,

        /// Annotation store (CSV)
        #[arg(long)]
        store: PathBuf,

        /// Table being annotated
        #[arg(short, long, default_value = "fournisseur")]
        table: LogicalTable,

        /// Key column identifying a row
        #[arg(short, long, default_value = "IDFournisseur")]
        key: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum AnnotateCommand {
    /// Show the next row without a label
    Next {
        /// Directory holding <table>.csv exports
        #[arg(short, long, value_name = "DIR")]
        source: PathBuf,

        /// Annotation store (CSV)
        #[arg(long)]
        store: PathBuf,

        /// Table being annotated
        #[arg(short, long, default_value = "fournisseur")]
        table: LogicalTable,

        /// Key column identifying a row
        #[arg(short, long, default_value = "IDFournisseur")]
        key: String,
    },

    /// Record a label for one key
    Label {
        /// Annotation store (CSV)
        #[arg(long)]
        store: PathBuf,

        /// Key of the labeled row
        #[arg(long)]
        key_value: String,

        /// Mark the row as an anomaly
        #[arg(long, conflicts_with = "normal", required_unless_present = "normal")]
        anomaly: bool,

        /// Mark the row as normal
        #[arg(long)]
        normal: bool,
    },
}
