//! The owning progress core.
//!
//! All state for the current run lives behind one mutex, so a stage and its
//! detail always change together. After every accepted change the core
//! publishes an immutable [`ProgressSnapshot`] on a `tokio::sync::watch`
//! channel. Producers never wait on consumers and consumers never wait on
//! producers: the lock is held only long enough to apply one report and
//! swap in the new snapshot.
//!
//! Each run is tagged with a [`RunEpoch`]. Starting a run or resetting the
//! core moves to a fresh epoch, and every report issued by a
//! [`RunReporter`] carries the epoch it was created under, so workers that
//! keep reporting after a reset are ignored.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use bulk_import_progress_models::{
    ImportingDetail, ParsingDetail, ProgressSnapshot, RunEpoch, StageSnapshot,
};
use tokio::sync::watch;

use crate::aggregate;
use crate::batch::BatchCoordinator;
use crate::clock::{Clock, SystemClock};
use crate::config::ProgressConfig;
use crate::format;
use crate::stats;
use crate::transition::{self, Transition};
use crate::update::ProgressUpdate;

/// Everything known about the current run.
#[derive(Debug, Clone)]
struct RunState {
    epoch: RunEpoch,
    snapshot: StageSnapshot,
    batch: BatchCoordinator,
    is_importing: bool,
    started_at: Option<Instant>,
    /// Records expected in the current file, from the parsing report.
    total_records: u64,
}

impl RunState {
    fn idle(epoch: RunEpoch) -> Self {
        Self {
            epoch,
            snapshot: StageSnapshot::Idle,
            batch: BatchCoordinator::single(),
            is_importing: false,
            started_at: None,
            total_records: 0,
        }
    }

    fn started(epoch: RunEpoch, total_files: usize, now: Instant) -> Self {
        Self {
            snapshot: StageSnapshot::Reading,
            batch: BatchCoordinator::new(total_files),
            is_importing: true,
            started_at: Some(now),
            ..Self::idle(epoch)
        }
    }

    fn to_snapshot(&self) -> ProgressSnapshot {
        let completed = matches!(self.snapshot, StageSnapshot::Completed(_));
        let file_progress = aggregate::file_progress(&self.snapshot);

        ProgressSnapshot {
            epoch: self.epoch,
            overall_progress: self.batch.overall_progress(file_progress, completed),
            file_progress,
            stage_snapshot: self.snapshot.clone(),
            status_text: format::status_text(&self.snapshot),
            stage_fraction: aggregate::intrinsic_fraction(&self.snapshot),
            is_importing: self.is_importing,
            batch: self.batch.info().clone(),
        }
    }

    /// Applies a report from the current epoch. Returns whether anything
    /// changed.
    fn apply(&mut self, update: ProgressUpdate, now: Instant, config: &ProgressConfig) -> bool {
        let stage = self.snapshot.stage();
        match transition::classify(stage, self.batch.has_pending_file(), &update) {
            Transition::Ignore(reason) => {
                log::debug!("Ignoring {} report in {stage}: {reason:?}", update.name());
                return false;
            }
            Transition::StartFile => {
                self.batch.begin_pending_file();
                self.total_records = 0;
                let info = self.batch.info();
                log::info!(
                    "Starting file {}/{} ({})",
                    info.current_file_index + 1,
                    info.total_files,
                    info.current_file_name
                );
            }
            Transition::Advance | Transition::Refine | Transition::Position => {}
        }

        let applied = match update {
            ProgressUpdate::CurrentFile { index, name } => {
                self.batch.update_current_file(index, &name)
            }
            ProgressUpdate::ToReading => {
                self.snapshot = StageSnapshot::Reading;
                true
            }
            ProgressUpdate::ToParsing {
                total_records,
                worker_count,
            } => {
                self.total_records = total_records;
                self.snapshot = StageSnapshot::Parsing(ParsingDetail {
                    processed_records: 0,
                    total_records,
                    active_workers: worker_count,
                });
                true
            }
            ProgressUpdate::ParsingProgress {
                processed_records,
                worker_count,
            } => {
                let StageSnapshot::Parsing(detail) = &mut self.snapshot else {
                    return false;
                };
                let before = *detail;
                // Workers finish out of order; a lower count is a late report.
                detail.processed_records = detail.processed_records.max(processed_records);
                detail.active_workers = worker_count;
                log::trace!(
                    "Parsed {}/{} records",
                    detail.processed_records,
                    detail.total_records
                );
                *detail != before
            }
            ProgressUpdate::ToImporting { total_batches } => {
                self.snapshot = StageSnapshot::Importing(ImportingDetail {
                    current_batch: 0,
                    total_batches,
                    records_processed: 0,
                    total_records: self.total_records,
                });
                true
            }
            ProgressUpdate::ImportingProgress {
                current_batch,
                records_processed,
            } => {
                let StageSnapshot::Importing(detail) = &mut self.snapshot else {
                    return false;
                };
                let before = *detail;
                detail.current_batch = detail.current_batch.max(current_batch);
                detail.records_processed = detail.records_processed.max(records_processed);
                log::trace!(
                    "Wrote batch {}/{}",
                    detail.current_batch,
                    detail.total_batches
                );
                *detail != before
            }
            ProgressUpdate::ToIndexing => {
                self.snapshot = StageSnapshot::Indexing {
                    operation: config.indexing_message.clone(),
                };
                true
            }
            ProgressUpdate::IndexingOperation { description } => {
                self.set_indexing_operation(description)
            }
            ProgressUpdate::IncrementalIndexing => {
                self.set_indexing_operation(config.incremental_indexing_message.clone())
            }
            ProgressUpdate::Complete { records_imported } => {
                let Some(started_at) = self.started_at else {
                    log::debug!("Ignoring completion: run has no start time");
                    return false;
                };
                let elapsed = now.saturating_duration_since(started_at);
                let stats = stats::completion_stats(records_imported, elapsed);
                log::info!(
                    "Import complete: {records_imported} records in {:.1}s ({} records/sec)",
                    stats.duration_seconds,
                    stats.records_per_second
                );
                self.snapshot = StageSnapshot::Completed(stats);
                self.is_importing = false;
                true
            }
        };

        let new_stage = self.snapshot.stage();
        if new_stage != stage {
            log::info!("Import stage {stage} -> {new_stage} (run {})", self.epoch);
        }
        applied
    }

    fn set_indexing_operation(&mut self, description: String) -> bool {
        let StageSnapshot::Indexing { operation } = &mut self.snapshot else {
            return false;
        };
        if *operation == description {
            return false;
        }
        log::trace!("Indexing: {description}");
        *operation = description;
        true
    }
}

struct Shared {
    state: Mutex<RunState>,
    publisher: watch::Sender<ProgressSnapshot>,
    clock: Arc<dyn Clock>,
    config: ProgressConfig,
}

/// Progress state for bulk imports, shared between producers and a display.
///
/// Cloning is cheap; every clone refers to the same run.
#[derive(Clone)]
pub struct ImportProgressCore {
    shared: Arc<Shared>,
}

impl ImportProgressCore {
    /// Creates an idle core using the system clock.
    #[must_use]
    pub fn new(config: ProgressConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an idle core that reads time from `clock`.
    #[must_use]
    pub fn with_clock(config: ProgressConfig, clock: Arc<dyn Clock>) -> Self {
        let state = RunState::idle(RunEpoch::default());
        let (publisher, _) = watch::channel(state.to_snapshot());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                publisher,
                clock,
                config,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ProgressConfig {
        &self.shared.config
    }

    /// Starts a single-file run and returns its reporter.
    ///
    /// Any run in progress is abandoned; its reporters go stale.
    pub fn start_import(&self) -> RunReporter {
        self.start_run(1)
    }

    /// Starts a run over `total_files` files and returns its reporter.
    ///
    /// A `total_files` of zero is treated as one.
    pub fn start_batch_import(&self, total_files: usize) -> RunReporter {
        self.start_run(total_files)
    }

    fn start_run(&self, total_files: usize) -> RunReporter {
        let now = self.shared.clock.now();
        let mut state = self.lock();
        let epoch = state.epoch.next();
        *state = RunState::started(epoch, total_files, now);
        log::info!(
            "Import run {epoch} started ({} file{})",
            state.batch.info().total_files,
            if state.batch.info().is_batch_import() { "s" } else { "" }
        );
        self.publish(&state);

        RunReporter {
            core: self.clone(),
            epoch,
        }
    }

    /// Abandons the current run and returns to idle.
    ///
    /// Reports from reporters of the abandoned run are ignored from now on.
    pub fn reset(&self) {
        let mut state = self.lock();
        let previous = state.epoch;
        *state = RunState::idle(previous.next());
        log::info!("Import run {previous} reset");
        self.publish(&state);
    }

    /// Reporter bound to whichever run is current right now.
    #[must_use]
    pub fn reporter(&self) -> RunReporter {
        RunReporter {
            core: self.clone(),
            epoch: self.current_epoch(),
        }
    }

    #[must_use]
    pub fn current_epoch(&self) -> RunEpoch {
        self.lock().epoch
    }

    /// Applies `update` if it belongs to the run identified by `epoch`.
    ///
    /// Returns whether the report changed the published state. Nothing is
    /// published otherwise, so stale and out-of-order reports, and late
    /// counts no higher than what is already recorded, return `false`
    /// without waking subscribers.
    pub fn apply(&self, epoch: RunEpoch, update: ProgressUpdate) -> bool {
        let now = self.shared.clock.now();
        let mut state = self.lock();

        if state.epoch != epoch {
            log::debug!(
                "Dropping {} report from stale run {epoch} (current run {})",
                update.name(),
                state.epoch
            );
            return false;
        }

        let applied = state.apply(update, now, &self.shared.config);
        if applied {
            self.publish(&state);
        }
        applied
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.shared.publisher.borrow().clone()
    }

    /// Receiver that is notified whenever a new snapshot is published.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.shared.publisher.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &RunState) {
        self.shared
            .publisher
            .send_replace(state.to_snapshot());
    }
}

impl Default for ImportProgressCore {
    fn default() -> Self {
        Self::new(ProgressConfig::default())
    }
}

impl std::fmt::Debug for ImportProgressCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportProgressCore")
            .field("snapshot", &*self.shared.publisher.borrow())
            .finish_non_exhaustive()
    }
}

/// Producer handle for one run.
///
/// Every method is fire-and-forget and returns whether the report was
/// applied. Once the run is reset or superseded, all methods return
/// `false` without touching state.
#[derive(Debug, Clone)]
pub struct RunReporter {
    core: ImportProgressCore,
    epoch: RunEpoch,
}

impl RunReporter {
    /// The run this reporter belongs to.
    #[must_use]
    pub const fn epoch(&self) -> RunEpoch {
        self.epoch
    }

    /// Whether this reporter's run is still the current one.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.core.current_epoch() == self.epoch
    }

    /// Sends an arbitrary report under this reporter's epoch.
    pub fn send(&self, update: ProgressUpdate) -> bool {
        self.core.apply(self.epoch, update)
    }

    pub fn update_current_file(&self, index: usize, name: impl Into<String>) -> bool {
        self.send(ProgressUpdate::CurrentFile {
            index,
            name: name.into(),
        })
    }

    pub fn update_to_reading(&self) -> bool {
        self.send(ProgressUpdate::ToReading)
    }

    pub fn update_to_parsing(&self, total_records: u64, worker_count: u32) -> bool {
        self.send(ProgressUpdate::ToParsing {
            total_records,
            worker_count,
        })
    }

    pub fn update_parsing_progress(&self, processed_records: u64, worker_count: u32) -> bool {
        self.send(ProgressUpdate::ParsingProgress {
            processed_records,
            worker_count,
        })
    }

    pub fn update_to_importing(&self, total_batches: u64) -> bool {
        self.send(ProgressUpdate::ToImporting { total_batches })
    }

    pub fn update_importing_progress(&self, current_batch: u64, records_processed: u64) -> bool {
        self.send(ProgressUpdate::ImportingProgress {
            current_batch,
            records_processed,
        })
    }

    pub fn update_to_indexing(&self) -> bool {
        self.send(ProgressUpdate::ToIndexing)
    }

    pub fn update_indexing_operation(&self, description: impl Into<String>) -> bool {
        self.send(ProgressUpdate::IndexingOperation {
            description: description.into(),
        })
    }

    pub fn update_incremental_indexing(&self) -> bool {
        self.send(ProgressUpdate::IncrementalIndexing)
    }

    /// Finishes the run with `records_imported` records written.
    pub fn complete_import(&self, records_imported: u64) -> bool {
        self.send(ProgressUpdate::Complete { records_imported })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bulk_import_progress_models::Stage;

    use super::*;
    use crate::clock::ManualClock;

    fn approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn core_with_clock() -> (ImportProgressCore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let core = ImportProgressCore::with_clock(ProgressConfig::default(), clock.clone());
        (core, clock)
    }

    #[test]
    fn starts_idle() {
        let core = ImportProgressCore::default();
        let snapshot = core.snapshot();
        assert_eq!(snapshot.stage(), Stage::Idle);
        assert!(snapshot.overall_progress.abs() < f64::EPSILON);
        assert!(!snapshot.is_importing);
        assert_eq!(snapshot.status_text, "Waiting to start");
        assert_eq!(snapshot.stage_fraction, None);
    }

    #[test]
    fn parsing_progress_is_weighted() {
        let core = ImportProgressCore::default();
        let run = core.start_import();
        assert!(run.update_to_parsing(1_000_000, 16));
        assert!(run.update_parsing_progress(450_000, 16));

        let snapshot = core.snapshot();
        assert_eq!(snapshot.stage(), Stage::Parsing);
        approx(snapshot.overall_progress, 0.29);
        approx(snapshot.stage_fraction.unwrap(), 0.45);
        assert_eq!(
            snapshot.status_text,
            "Parsed 450,000 / 1,000,000 records (45%) • 16 workers"
        );
    }

    #[test]
    fn refinement_while_idle_changes_nothing() {
        let core = ImportProgressCore::default();
        let before = core.snapshot();

        assert!(!core.reporter().update_parsing_progress(100, 16));

        let after = core.snapshot();
        assert_eq!(after, before);
        assert_eq!(after.stage(), Stage::Idle);
        assert!(after.overall_progress.abs() < f64::EPSILON);
    }

    #[test]
    fn advancing_while_idle_does_not_open_a_run() {
        let core = ImportProgressCore::default();
        let before = core.snapshot();

        let reporter = core.reporter();
        assert!(!reporter.update_to_parsing(1_000, 4));
        assert!(!reporter.update_to_indexing());
        assert_eq!(core.snapshot(), before);
        assert!(!core.snapshot().is_importing);
    }

    #[test]
    fn full_run_reports_completion_statistics() {
        let (core, clock) = core_with_clock();
        let run = core.start_import();
        assert_eq!(core.snapshot().status_text, "Preparing import...");

        assert!(run.update_to_parsing(3_200_000, 8));
        assert!(run.update_parsing_progress(3_200_000, 8));
        assert!(run.update_to_importing(32));
        assert!(run.update_importing_progress(32, 3_200_000));
        assert!(run.update_to_indexing());
        assert!(run.update_indexing_operation("Rebuilding record index"));
        clock.advance(Duration::from_secs(120));
        assert!(run.complete_import(3_200_000));

        let snapshot = core.snapshot();
        assert_eq!(snapshot.stage(), Stage::Completed);
        assert!((snapshot.overall_progress - 1.0).abs() < f64::EPSILON);
        assert!(!snapshot.is_importing);
        let stats = snapshot.completion().unwrap();
        assert_eq!(stats.records_per_second, 26_666);
        assert_eq!(
            snapshot.status_text,
            "Imported 3,200,000 records in 2m 0s • 26,666 records/sec"
        );
    }

    #[test]
    fn importing_progress_while_parsing_is_ignored() {
        let core = ImportProgressCore::default();
        let run = core.start_import();
        run.update_to_parsing(1_000, 4);
        run.update_parsing_progress(200, 4);
        let before = core.snapshot();

        assert!(!run.update_importing_progress(3, 300));
        assert_eq!(core.snapshot(), before);
    }

    #[test]
    fn batch_run_tracks_current_file() {
        let core = ImportProgressCore::default();
        let run = core.start_batch_import(5);
        assert!(run.update_current_file(2, "file3.csv"));

        let snapshot = core.snapshot();
        assert!(snapshot.is_batch_import());
        assert_eq!(snapshot.current_file_index(), 2);
        assert_eq!(snapshot.current_file_name(), "file3.csv");
        assert_eq!(snapshot.total_files(), 5);
        // Announcing a file does not move the pipeline.
        assert_eq!(snapshot.stage(), Stage::Reading);
        assert!(snapshot.overall_progress.abs() < f64::EPSILON);
    }

    #[test]
    fn reset_clears_active_run() {
        let core = ImportProgressCore::default();
        let run = core.start_batch_import(3);
        run.update_current_file(1, "b.csv");
        run.update_to_parsing(100, 2);
        run.update_parsing_progress(50, 2);

        core.reset();

        let snapshot = core.snapshot();
        assert_eq!(snapshot.stage(), Stage::Idle);
        assert!(snapshot.overall_progress.abs() < f64::EPSILON);
        assert!(!snapshot.is_importing);
        assert!(!snapshot.is_batch_import());
        assert_eq!(snapshot.current_file_index(), 0);
        assert_eq!(snapshot.current_file_name(), "");
    }

    #[test]
    fn reports_after_reset_are_dropped() {
        let core = ImportProgressCore::default();
        let stale = core.start_import();
        stale.update_to_parsing(100, 2);
        core.reset();

        assert!(!stale.is_current());
        assert!(!stale.update_parsing_progress(50, 2));
        assert!(!stale.update_to_importing(10));
        assert_eq!(core.snapshot().stage(), Stage::Idle);

        let fresh = core.start_import();
        assert!(fresh.epoch() > stale.epoch());
        assert!(!stale.update_to_parsing(100, 2));
        assert_eq!(core.snapshot().stage(), Stage::Reading);
        assert!(fresh.update_to_parsing(100, 2));
    }

    #[test]
    fn restarting_supersedes_previous_run() {
        let core = ImportProgressCore::default();
        let first = core.start_import();
        first.update_to_parsing(100, 2);

        let second = core.start_import();
        assert!(!first.update_parsing_progress(10, 2));
        assert_eq!(core.snapshot().stage(), Stage::Reading);
        assert_eq!(core.snapshot().epoch, second.epoch());
    }

    #[test]
    fn completing_without_a_start_is_a_no_op() {
        let core = ImportProgressCore::default();
        assert!(!core.reporter().complete_import(100));
        assert_eq!(core.snapshot().stage(), Stage::Idle);
    }

    #[test]
    fn late_counts_never_move_progress_backwards() {
        let core = ImportProgressCore::default();
        let run = core.start_import();
        run.update_to_parsing(1_000, 4);
        run.update_parsing_progress(600, 4);
        run.update_parsing_progress(400, 3);

        let snapshot = core.snapshot();
        let StageSnapshot::Parsing(detail) = snapshot.stage_snapshot else {
            panic!("expected parsing");
        };
        assert_eq!(detail.processed_records, 600);
        assert_eq!(detail.active_workers, 3);

        run.update_to_importing(10);
        run.update_importing_progress(5, 500);
        run.update_importing_progress(4, 400);
        let StageSnapshot::Importing(detail) = core.snapshot().stage_snapshot else {
            panic!("expected importing");
        };
        assert_eq!(detail.current_batch, 5);
        assert_eq!(detail.records_processed, 500);
        assert_eq!(detail.total_records, 1_000);
    }

    #[test]
    fn backward_stage_reports_are_ignored() {
        let core = ImportProgressCore::default();
        let run = core.start_import();
        run.update_to_importing(4);
        assert!(!run.update_to_parsing(100, 2));
        assert!(!run.update_to_reading());
        assert!(!run.update_to_importing(8));
        assert_eq!(core.snapshot().stage(), Stage::Importing);
    }

    #[test]
    fn indexing_text_follows_operations() {
        let core = ImportProgressCore::default();
        let run = core.start_import();
        assert!(!run.update_incremental_indexing());

        run.update_to_indexing();
        assert_eq!(core.snapshot().status_text, "Building indexes...");
        approx(core.snapshot().overall_progress, 0.6);
        assert_eq!(core.snapshot().stage_fraction, None);

        run.update_incremental_indexing();
        assert_eq!(
            core.snapshot().status_text,
            "Updating indexes incrementally..."
        );

        run.update_indexing_operation("Analyzing tables");
        assert_eq!(core.snapshot().status_text, "Analyzing tables");
        assert!(!run.update_indexing_operation("Analyzing tables"));
    }

    #[test]
    fn completed_run_ignores_further_reports() {
        let core = ImportProgressCore::default();
        let run = core.start_import();
        run.complete_import(10);
        let before = core.snapshot();

        assert!(!run.update_to_parsing(10, 1));
        assert!(!run.complete_import(20));
        assert!(!run.update_current_file(0, "late.csv"));
        assert_eq!(core.snapshot(), before);
    }

    #[test]
    fn batch_files_restart_the_pipeline_and_spread_progress() {
        let core = ImportProgressCore::default();
        let run = core.start_batch_import(2);

        run.update_current_file(0, "a.csv");
        run.update_to_parsing(100, 2);
        run.update_parsing_progress(100, 2);
        run.update_to_importing(1);
        run.update_importing_progress(1, 100);
        run.update_to_indexing();
        let end_of_first = core.snapshot();
        approx(end_of_first.file_progress, 0.6);
        approx(end_of_first.overall_progress, 0.3);

        run.update_current_file(1, "b.csv");
        assert!(run.update_to_reading());
        let start_of_second = core.snapshot();
        assert_eq!(start_of_second.stage(), Stage::Reading);
        approx(start_of_second.file_progress, 0.0);
        approx(start_of_second.overall_progress, 0.5);

        run.update_to_parsing(300, 2);
        run.update_parsing_progress(150, 2);
        approx(core.snapshot().overall_progress, 0.5 + 0.3 / 2.0);

        assert!(run.complete_import(400));
        assert!((core.snapshot().overall_progress - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn next_file_may_skip_reading() {
        let core = ImportProgressCore::default();
        let run = core.start_batch_import(3);
        run.update_to_indexing();

        run.update_current_file(1, "b.csv");
        assert!(run.update_to_parsing(50, 1));
        let snapshot = core.snapshot();
        assert_eq!(snapshot.stage(), Stage::Parsing);
        approx(snapshot.overall_progress, (1.0 + 0.2) / 3.0);
    }

    #[test]
    fn overall_progress_holds_when_the_next_file_starts() {
        let core = ImportProgressCore::default();
        let run = core.start_batch_import(2);
        run.update_to_indexing();
        let before = core.snapshot();
        approx(before.overall_progress, 0.3);

        run.update_current_file(1, "b.csv");
        assert!(run.update_to_reading());
        let after = core.snapshot();
        assert_eq!(after.stage(), Stage::Reading);
        assert_eq!(after.epoch, before.epoch);
        approx(after.file_progress, 0.0);
        assert!(after.overall_progress >= before.overall_progress);
    }

    #[test]
    fn late_counts_publish_nothing() {
        let core = ImportProgressCore::default();
        let run = core.start_import();
        run.update_to_parsing(1_000, 4);
        assert!(run.update_parsing_progress(600, 4));
        let mut rx = core.subscribe();

        assert!(!run.update_parsing_progress(400, 4));
        assert!(!rx.has_changed().unwrap());
        // A changed worker count is still news.
        assert!(run.update_parsing_progress(400, 3));
        assert!(rx.has_changed().unwrap());
        rx.mark_unchanged();

        run.update_to_importing(10);
        assert!(run.update_importing_progress(5, 500));
        rx.mark_unchanged();
        assert!(!run.update_importing_progress(4, 400));
        assert!(!run.update_importing_progress(5, 500));
        assert!(!run.update_importing_progress(3, 300));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn subscribers_see_published_snapshots() {
        let core = ImportProgressCore::default();
        let mut rx = core.subscribe();
        assert!(!rx.has_changed().unwrap());

        let run = core.start_import();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().stage(), Stage::Reading);

        // Ignored reports publish nothing.
        run.update_importing_progress(1, 1);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn scripted_runs_respect_ordering_and_bounds() {
        let script = [
            ProgressUpdate::ToImporting { total_batches: 4 },
            ProgressUpdate::ToParsing {
                total_records: 100,
                worker_count: 2,
            },
            ProgressUpdate::ImportingProgress {
                current_batch: 2,
                records_processed: 50,
            },
            ProgressUpdate::ParsingProgress {
                processed_records: 90,
                worker_count: 2,
            },
            ProgressUpdate::ToReading,
            ProgressUpdate::ImportingProgress {
                current_batch: 1,
                records_processed: 20,
            },
            ProgressUpdate::IncrementalIndexing,
            ProgressUpdate::ToIndexing,
            ProgressUpdate::ToImporting { total_batches: 9 },
            ProgressUpdate::IndexingOperation {
                description: "Vacuuming".to_string(),
            },
            ProgressUpdate::Complete {
                records_imported: 100,
            },
            ProgressUpdate::ToParsing {
                total_records: 1,
                worker_count: 1,
            },
        ];

        let core = ImportProgressCore::default();
        let run = core.start_import();
        let mut stages = vec![core.snapshot().stage()];
        let mut last_progress = core.snapshot().overall_progress;

        for update in script {
            run.send(update);
            let snapshot = core.snapshot();
            assert!((0.0..=1.0).contains(&snapshot.overall_progress));
            assert!(snapshot.overall_progress >= last_progress);
            last_progress = snapshot.overall_progress;
            if stages.last() != Some(&snapshot.stage()) {
                stages.push(snapshot.stage());
            }
        }

        assert!(stages.windows(2).all(|pair| pair[0] < pair[1]), "{stages:?}");
        assert_eq!(
            stages,
            vec![
                Stage::Reading,
                Stage::Importing,
                Stage::Indexing,
                Stage::Completed
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_keep_state_consistent() {
        const WORKERS: u64 = 8;
        const RECORDS_PER_WORKER: u64 = 1_000;

        let core = ImportProgressCore::default();
        let mut rx = core.subscribe();

        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                let done = snapshot.stage() == Stage::Completed;
                seen.push(snapshot);
                if done {
                    break;
                }
            }
            seen
        });

        let run = core.start_import();
        let total = WORKERS * RECORDS_PER_WORKER;
        run.update_to_parsing(total, u32::try_from(WORKERS).unwrap());

        let parsed = Arc::new(std::sync::atomic::AtomicU64::new(0));
        let mut handles = Vec::new();
        for _ in 0..WORKERS {
            let run = run.clone();
            let parsed = parsed.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..RECORDS_PER_WORKER / 100 {
                    let now = parsed.fetch_add(100, std::sync::atomic::Ordering::SeqCst) + 100;
                    run.update_parsing_progress(now, 8);
                    // Stale stage reports from a confused worker.
                    run.update_importing_progress(1, 1);
                    tokio::task::yield_now().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let StageSnapshot::Parsing(detail) = core.snapshot().stage_snapshot else {
            panic!("expected parsing");
        };
        assert_eq!(detail.processed_records, total);

        run.update_to_importing(10);
        run.update_to_indexing();
        run.complete_import(total);

        let seen = observer.await.unwrap();
        assert_eq!(seen.last().map(ProgressSnapshot::stage), Some(Stage::Completed));
        for pair in seen.windows(2) {
            assert!(pair[0].overall_progress <= pair[1].overall_progress);
        }
        for snapshot in &seen {
            assert!((0.0..=1.0).contains(&snapshot.overall_progress));
            assert_eq!(snapshot.epoch, run.epoch());
        }
    }
}
