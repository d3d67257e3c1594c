//! Simulated import engine.
//!
//! Walks one or more synthetic files through the full pipeline the way a
//! real engine would: a reader, a pool of parse workers reporting
//! concurrently, a batched writer, and an indexer. Nothing is read or
//! written; the point is to drive [`ImportProgressCore`] with realistic
//! report traffic and watch the result.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use bulk_import_cli_utils::{MultiProgress, SnapshotProgress};
use bulk_import_progress::{ImportProgressCore, ProgressConfig, ProgressSnapshot, RunReporter};

/// Records parsed between two progress reports from one worker.
const PARSE_CHUNK: u64 = 5_000;

/// Shape of a simulated run.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    /// Files in the run.
    pub files: usize,
    /// Records per file.
    pub records: u64,
    /// Parse workers per file.
    pub workers: u32,
    /// Records written per batch.
    pub batch_size: u64,
    /// Pause between simulated units of work.
    pub step_delay: Duration,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            files: 1,
            records: 1_000_000,
            workers: 8,
            batch_size: 50_000,
            step_delay: Duration::from_millis(20),
        }
    }
}

/// How a simulated run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// Every file went through the pipeline and the run completed.
    Completed,
    /// The core was reset while the run was in flight.
    Cancelled,
}

/// Runs a simulation against a fresh core, drawing progress bars on
/// `multi` and resetting the run on Ctrl-C.
///
/// Returns the last snapshot the display saw.
///
/// # Errors
///
/// Returns an error if a parse worker panics or the display task fails.
pub async fn run_with_display(
    multi: &MultiProgress,
    config: ProgressConfig,
    options: &SimulationOptions,
) -> Result<ProgressSnapshot, Box<dyn std::error::Error>> {
    let core = ImportProgressCore::new(config);

    let display = tokio::spawn(bulk_import_cli_utils::follow(
        core.subscribe(),
        SnapshotProgress::new(multi, core.current_epoch()),
    ));

    let interrupt = {
        let core = core.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, resetting import");
                core.reset();
            }
        })
    };

    let outcome = run(&core, options).await;
    interrupt.abort();
    let outcome = outcome?;

    let last = display.await?;
    log::info!("Simulation finished: {outcome:?}");
    Ok(last)
}

/// Drives `core` through a full simulated run.
///
/// # Errors
///
/// Returns an error if a parse worker panics.
pub async fn run(
    core: &ImportProgressCore,
    options: &SimulationOptions,
) -> Result<SimulationOutcome, tokio::task::JoinError> {
    let files = options.files.max(1);
    let reporter = if files > 1 {
        core.start_batch_import(files)
    } else {
        core.start_import()
    };
    log::info!(
        "Simulating {files} file(s) of {} records with {} workers",
        options.records,
        options.workers
    );

    for index in 0..files {
        reporter.update_current_file(index, format!("file{}.csv", index + 1));
        reporter.update_to_reading();
        tokio::time::sleep(options.step_delay).await;
        if !reporter.is_current() {
            return Ok(SimulationOutcome::Cancelled);
        }

        parse(&reporter, options).await?;
        if !reporter.is_current() {
            return Ok(SimulationOutcome::Cancelled);
        }

        write_batches(&reporter, options).await;
        if !reporter.is_current() {
            return Ok(SimulationOutcome::Cancelled);
        }

        reporter.update_to_indexing();
        tokio::time::sleep(options.step_delay).await;
        if index == 0 {
            reporter.update_indexing_operation("Building primary key index");
        } else {
            reporter.update_incremental_indexing();
        }
        tokio::time::sleep(options.step_delay).await;
    }

    let total = options.records.saturating_mul(files as u64);
    if reporter.complete_import(total) {
        Ok(SimulationOutcome::Completed)
    } else {
        Ok(SimulationOutcome::Cancelled)
    }
}

/// Splits the file between parse workers that report concurrently.
async fn parse(
    reporter: &RunReporter,
    options: &SimulationOptions,
) -> Result<(), tokio::task::JoinError> {
    let workers = options.workers.max(1);
    reporter.update_to_parsing(options.records, workers);

    let parsed = Arc::new(AtomicU64::new(0));
    let active = Arc::new(AtomicU32::new(workers));
    let share = options.records.div_ceil(u64::from(workers));

    let handles = (0..u64::from(workers)).map(|worker| {
        let reporter = reporter.clone();
        let parsed = parsed.clone();
        let active = active.clone();
        let start = worker * share;
        let end = ((worker + 1) * share).min(options.records);
        let delay = options.step_delay;

        tokio::spawn(async move {
            let mut position = start;
            while position < end && reporter.is_current() {
                let chunk = PARSE_CHUNK.min(end - position);
                tokio::time::sleep(delay).await;
                position += chunk;
                let total = parsed.fetch_add(chunk, Ordering::SeqCst) + chunk;
                reporter.update_parsing_progress(total, active.load(Ordering::SeqCst));
            }
            let remaining = active.fetch_sub(1, Ordering::SeqCst) - 1;
            reporter.update_parsing_progress(parsed.load(Ordering::SeqCst), remaining);
        })
    });

    futures::future::try_join_all(handles).await?;
    Ok(())
}

/// Writes the parsed records in fixed-size batches.
async fn write_batches(reporter: &RunReporter, options: &SimulationOptions) {
    let batch_size = options.batch_size.max(1);
    let total_batches = options.records.div_ceil(batch_size);
    reporter.update_to_importing(total_batches);

    for batch in 1..=total_batches {
        tokio::time::sleep(options.step_delay).await;
        let written = (batch * batch_size).min(options.records);
        if !reporter.update_importing_progress(batch, written) {
            return;
        }
    }
}
