//! Status lines for display layers.
//!
//! Consumers render these strings as-is so none of the arithmetic has to be
//! repeated on the display side. Counts are printed with thousands
//! separators; percentages are floored and left out entirely when their
//! total is unknown.

use std::fmt::Write as _;

use bulk_import_progress_models::{
    BatchInfo, CompletionStats, ImportingDetail, ParsingDetail, StageSnapshot,
};
use indicatif::HumanCount;

/// Status line shown while idle.
pub const IDLE_STATUS: &str = "Waiting to start";

/// Status line shown while reading the input.
pub const READING_STATUS: &str = "Preparing import...";

/// Status line for whatever stage `snapshot` describes.
#[must_use]
pub fn status_text(snapshot: &StageSnapshot) -> String {
    match snapshot {
        StageSnapshot::Idle => IDLE_STATUS.to_string(),
        StageSnapshot::Reading => READING_STATUS.to_string(),
        StageSnapshot::Parsing(detail) => parsing_status(detail),
        StageSnapshot::Importing(detail) => importing_status(detail),
        StageSnapshot::Indexing { operation } => operation.clone(),
        StageSnapshot::Completed(stats) => completion_status(stats),
    }
}

/// `"Parsed 450,000 / 1,000,000 records (45%) • 16 workers"`
#[must_use]
pub fn parsing_status(detail: &ParsingDetail) -> String {
    format!(
        "Parsed {} / {} records{} • {} workers",
        HumanCount(detail.processed_records),
        HumanCount(detail.total_records),
        percentage_suffix(detail.processed_records, detail.total_records),
        detail.active_workers,
    )
}

/// `"Batch 3 / 10 (30%) • 30,000 / 100,000 records (30%)"`
#[must_use]
pub fn importing_status(detail: &ImportingDetail) -> String {
    format!(
        "Batch {} / {}{} • {} / {} records{}",
        HumanCount(detail.current_batch),
        HumanCount(detail.total_batches),
        percentage_suffix(detail.current_batch, detail.total_batches),
        HumanCount(detail.records_processed),
        HumanCount(detail.total_records),
        percentage_suffix(detail.records_processed, detail.total_records),
    )
}

/// `"Imported 3,200,000 records in 2m 0s • 26,666 records/sec"`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn completion_status(stats: &CompletionStats) -> String {
    let whole_seconds = stats.duration_seconds.max(0.0).floor() as u64;
    format!(
        "Imported {} records in {}m {}s • {} records/sec",
        HumanCount(stats.records_imported),
        whole_seconds / 60,
        whole_seconds % 60,
        HumanCount(stats.records_per_second),
    )
}

/// Floored percentage of `done` over `total`, or `None` when `total` is 0.
#[must_use]
pub fn percentage(done: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    let percent = u128::from(done) * 100 / u128::from(total);
    Some(u64::try_from(percent).unwrap_or(u64::MAX))
}

/// `"File 3 / 5: file3.csv"`, or `None` for single-file runs.
#[must_use]
pub fn file_label(batch: &BatchInfo) -> Option<String> {
    if !batch.is_batch_import() {
        return None;
    }

    let mut label = format!(
        "File {} / {}",
        batch.current_file_index + 1,
        batch.total_files
    );
    if !batch.current_file_name.is_empty() {
        write!(label, ": {}", batch.current_file_name).ok();
    }
    Some(label)
}

fn percentage_suffix(done: u64, total: u64) -> String {
    percentage(done, total).map_or_else(String::new, |percent| format!(" ({percent}%)"))
}
