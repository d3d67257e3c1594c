#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the bulk import progress tools.
//!
//! Runs simulated imports against the progress core and draws the
//! published snapshots as progress bars. Without a subcommand, an
//! interactive menu guides the user through the options.
//!
//! Uses `indicatif-log-bridge` (via [`bulk_import_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod interactive;
mod simulate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use bulk_import_progress::{ProgressConfig, ProgressSnapshot, Stage, aggregate};
use clap::{Parser, Subcommand};

use crate::simulate::SimulationOptions;

#[derive(Parser)]
#[command(name = "bulk_import_cli", about = "Bulk import progress tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate an import and display its progress
    Simulate {
        /// Number of files in the run (more than one makes it a batch import)
        #[arg(long, default_value = "1")]
        files: usize,
        /// Records per file
        #[arg(long, default_value = "1000000")]
        records: u64,
        /// Parse workers per file
        #[arg(long, default_value = "8")]
        workers: u32,
        /// Records written per batch
        #[arg(long, default_value = "50000")]
        batch_size: u64,
        /// Pause between simulated units of work, in milliseconds
        #[arg(long, default_value = "20")]
        step_delay_ms: u64,
        /// Progress configuration file (TOML). `BULK_IMPORT_INDEXING_MESSAGE`
        /// and `BULK_IMPORT_INCREMENTAL_INDEXING_MESSAGE` override its
        /// status lines.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the final snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the pipeline stages and the progress credited before each
    Stages,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = bulk_import_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Simulate {
            files,
            records,
            workers,
            batch_size,
            step_delay_ms,
            config,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let options = SimulationOptions {
                files,
                records,
                workers,
                batch_size,
                step_delay: Duration::from_millis(step_delay_ms),
            };
            let last = simulate::run_with_display(&multi, config, &options).await?;
            print_result(&last, json)?;
        }
        Commands::Stages => print_stages(),
    }

    Ok(())
}

/// Loads the progress configuration from `path` (or defaults) and applies
/// environment overrides.
fn load_config(path: Option<&Path>) -> Result<ProgressConfig, bulk_import_progress::ConfigError> {
    let config = match path {
        Some(path) => ProgressConfig::from_file(path)?,
        None => ProgressConfig::default(),
    };
    config.with_env_overrides()
}

fn print_result(snapshot: &ProgressSnapshot, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
    } else if snapshot.stage() == Stage::Completed {
        println!("{}", snapshot.status_text);
    } else {
        println!("Import cancelled");
    }
    Ok(())
}

fn print_stages() {
    println!("{:<4} {:<12} {:<20} BASE", "#", "STAGE", "DESCRIPTION");
    println!("{}", "-".repeat(46));
    for stage in Stage::ALL {
        println!(
            "{:<4} {:<12} {:<20} {:.0}%",
            stage.ordinal(),
            stage.as_ref(),
            stage.label(),
            aggregate::base_progress(stage) * 100.0
        );
    }
}
