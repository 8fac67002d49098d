//! cleanscan CLI - table cleaning and anomaly scanning.

mod cli;
mod commands;

use clap::Parser;
use cli::{AnnotateCommand, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "cleanscan=debug" } else { "cleanscan=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Clean {
            source,
            table,
            output,
        } => commands::clean::run(source, table, output),

        Commands::Detect {
            source,
            table,
            config,
            contamination,
            percentile,
            epochs,
            learning_rate,
            seed,
            output,
        } => commands::detect::run(commands::detect::DetectArgs {
            source,
            table,
            config,
            contamination,
            percentile,
            epochs,
            learning_rate,
            seed,
            output,
        }),

        Commands::Annotate { action } => match action {
            AnnotateCommand::Next {
                source,
                store,
                table,
                key,
            } => commands::annotate::next(source, store, table, key),
            AnnotateCommand::Label {
                store,
                key_value,
                anomaly,
                normal: _,
            } => commands::annotate::label(store, key_value, anomaly),
        },

        Commands::Status {
            source,
            store,
            table,
            key,
            json,
        } => commands::status::run(source, store, table, key, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
