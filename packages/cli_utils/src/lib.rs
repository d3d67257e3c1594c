#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for bulk import tools.
//!
//! Provides [`SnapshotProgress`], which draws published
//! [`ProgressSnapshot`]s as `indicatif` progress bars, plus
//! [`init_logger`] which sets up `indicatif-log-bridge` so that
//! `log::info!` and friends are suspended while progress bars redraw.
//!
//! Any binary that calls [`init_logger()`] at startup gets full progress bar
//! support for free.

use std::time::Duration;

use bulk_import_progress::{ProgressSnapshot, RunEpoch, Stage, format};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::watch;

pub use indicatif::MultiProgress;

/// Bar positions per whole run. Overall progress is a fraction, so it is
/// scaled onto this many steps for drawing.
pub const PROGRESS_SCALE: u64 = 1_000;

/// Draws import snapshots onto `indicatif` bars.
///
/// The overall bar starts as a spinner and switches to a full bar once a
/// run starts. Batch runs get a second bar counting files.
pub struct SnapshotProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    /// Style to switch to once a run starts.
    bar_style: ProgressStyle,
    files: Option<ProgressBar>,
    started: bool,
    /// Epoch of the core when the display was created. An idle snapshot
    /// from any later epoch means a run came and went.
    baseline: RunEpoch,
}

impl SnapshotProgress {
    /// Adds the overall bar to `multi`, initially as an idle spinner.
    ///
    /// `baseline` is the core's epoch before the run being displayed was
    /// started.
    #[must_use]
    pub fn new(multi: &MultiProgress, baseline: RunEpoch) -> Self {
        let overall = multi.add(ProgressBar::new_spinner());
        overall.enable_steady_tick(Duration::from_millis(100));
        overall.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        overall.set_message(format::IDLE_STATUS);

        let bar_style = ProgressStyle::with_template(
            "  {msg}\n  {wide_bar:.cyan/dim} {percent}% [{elapsed_precise}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self {
            multi: multi.clone(),
            overall,
            bar_style,
            files: None,
            started: false,
            baseline,
        }
    }

    /// Draws `snapshot`. Returns `true` once the run has ended, either by
    /// completing or by being reset. A reset is recognised even when the
    /// run's own snapshots were never seen.
    pub fn render(&mut self, snapshot: &ProgressSnapshot) -> bool {
        if snapshot.stage() == Stage::Idle {
            if self.started || snapshot.epoch > self.baseline {
                self.overall.abandon_with_message("Import cancelled");
                if let Some(files) = &self.files {
                    files.abandon();
                }
                return true;
            }
            self.overall.set_message(snapshot.status_text.clone());
            return false;
        }

        if !self.started {
            self.started = true;
            self.overall.set_length(PROGRESS_SCALE);
            self.overall.set_position(0);
            // Switch from spinner to bar style now that a run is underway.
            self.overall.set_style(self.bar_style.clone());
        }

        self.overall.set_position(scaled(snapshot.overall_progress));
        self.overall.set_message(message_for(snapshot));

        if snapshot.is_batch_import() {
            let files = self.files_bar(snapshot.total_files());
            files.set_position(snapshot.current_file_index() as u64);
        }

        if snapshot.stage() == Stage::Completed {
            if let Some(files) = &self.files {
                files.set_position(snapshot.total_files() as u64);
                files.finish();
            }
            self.overall.finish_with_message(snapshot.status_text.clone());
            return true;
        }

        false
    }

    /// Creates the file-count bar on first use. Total is known up front so
    /// this starts as a bar immediately.
    fn files_bar(&mut self, total_files: usize) -> &ProgressBar {
        self.files.get_or_insert_with(|| {
            let bar = self
                .multi
                .insert_before(&self.overall, ProgressBar::new(total_files as u64));
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
            );
            bar.set_message("Files");
            bar
        })
    }
}

/// Renders every snapshot published on `rx` until the run ends or the core
/// is dropped. Returns the last snapshot seen.
pub async fn follow(
    mut rx: watch::Receiver<ProgressSnapshot>,
    mut progress: SnapshotProgress,
) -> ProgressSnapshot {
    let mut last = rx.borrow_and_update().clone();
    if progress.render(&last) {
        return last;
    }

    while rx.changed().await.is_ok() {
        last = rx.borrow_and_update().clone();
        if progress.render(&last) {
            break;
        }
    }

    last
}

/// Status line with the file label prepended for batch runs.
#[must_use]
pub fn message_for(snapshot: &ProgressSnapshot) -> String {
    format::file_label(&snapshot.batch).map_or_else(
        || snapshot.status_text.clone(),
        |label| format!("{label} • {}", snapshot.status_text),
    )
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn scaled(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * PROGRESS_SCALE as f64).round() as u64
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while progress bars redraw.
///
/// Returns the [`MultiProgress`] that all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    // Build the pretty-env-logger logger manually so we can wrap it.
    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // Ignore error if logger was already set (e.g., in tests)

    log::set_max_level(level);

    multi
}
