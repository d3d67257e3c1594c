//! Completion statistics for a finished run.

use std::time::Duration;

use bulk_import_progress_models::CompletionStats;

/// Builds the statistics for a run that wrote `records_imported` records
/// in `elapsed`.
///
/// The rate is floored to whole records per second. A run that took no
/// measurable time is treated as instantaneous: its rate is the record
/// count itself rather than an infinite value.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn completion_stats(records_imported: u64, elapsed: Duration) -> CompletionStats {
    let duration_seconds = elapsed.as_secs_f64();
    let records_per_second = if duration_seconds > 0.0 {
        (records_imported as f64 / duration_seconds).floor() as u64
    } else {
        records_imported
    };

    CompletionStats {
        duration_seconds,
        records_imported,
        records_per_second,
    }
}
