#![allow(clippy::module_name_repetitions)]

//! Interactive menu for the bulk import tools.
//!
//! Provides a menu-driven interface using `dialoguer` for running
//! simulations without memorizing CLI flags.

use std::time::{Duration, Instant};

use bulk_import_cli_utils::MultiProgress;
use bulk_import_progress::{ProgressConfig, Stage};
use dialoguer::{Input, Select};

use crate::simulate::{self, SimulationOptions};

/// Top-level actions available in the interactive menu.
enum Action {
    SingleFile,
    Batch,
    ListStages,
}

impl Action {
    const ALL: &[Self] = &[Self::SingleFile, Self::Batch, Self::ListStages];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::SingleFile => "Simulate single-file import",
            Self::Batch => "Simulate batch import",
            Self::ListStages => "List pipeline stages",
        }
    }
}

/// Runs the interactive menu, prompting the user to select and configure
/// a simulation.
///
/// # Errors
///
/// Returns an error if a prompt fails or the simulation fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    let files = match Action::ALL[idx] {
        Action::ListStages => {
            for stage in Stage::ALL {
                println!("{:>2}. {}", stage.ordinal(), stage.label());
            }
            return Ok(());
        }
        Action::SingleFile => 1,
        Action::Batch => Input::<usize>::new()
            .with_prompt("Number of files")
            .default(3)
            .interact_text()?,
    };

    let defaults = SimulationOptions::default();
    let records: u64 = Input::new()
        .with_prompt("Records per file")
        .default(defaults.records)
        .interact_text()?;
    let workers: u32 = Input::new()
        .with_prompt("Parse workers")
        .default(defaults.workers)
        .interact_text()?;
    let batch_size: u64 = Input::new()
        .with_prompt("Records per batch")
        .default(defaults.batch_size)
        .interact_text()?;

    let config = ProgressConfig::default().with_env_overrides()?;

    let options = SimulationOptions {
        files,
        records,
        workers,
        batch_size,
        step_delay: Duration::from_millis(20),
    };

    let start = Instant::now();
    let last = simulate::run_with_display(multi, config, &options).await?;
    crate::print_result(&last, false)?;
    log::info!("Simulation took {:.1}s", start.elapsed().as_secs_f64());

    Ok(())
}
