//! Folds the active stage and its detail into one completion fraction.
//!
//! Each of the five pipeline steps is worth the same share of the whole.
//! A stage contributes its full share once the pipeline has moved past it,
//! and a partial share while it is active if it knows its own fraction
//! (records parsed, batches written). Indeterminate stages contribute
//! nothing until the next stage begins.

use bulk_import_progress_models::{Stage, StageSnapshot};

/// Share of the whole run carried by one stage.
#[must_use]
pub fn stage_weight() -> f64 {
    1.0 / f64::from(Stage::STEP_COUNT)
}

/// Progress credited for all stages before `stage`.
#[must_use]
pub fn base_progress(stage: Stage) -> f64 {
    match stage {
        Stage::Idle => 0.0,
        stage => f64::from(stage.ordinal() - 1) * stage_weight(),
    }
}

/// Stage-local completion in `[0, 1]`, or `None` when the stage is
/// indeterminate or its total is unknown.
#[must_use]
pub fn intrinsic_fraction(snapshot: &StageSnapshot) -> Option<f64> {
    match snapshot {
        StageSnapshot::Parsing(detail) => ratio(detail.processed_records, detail.total_records),
        StageSnapshot::Importing(detail) => ratio(detail.current_batch, detail.total_batches),
        StageSnapshot::Idle
        | StageSnapshot::Reading
        | StageSnapshot::Indexing { .. }
        | StageSnapshot::Completed(_) => None,
    }
}

/// Completion of a single file's pipeline in `[0, 1]`.
///
/// Indeterminate stages count as zero progress within the stage. A
/// completed snapshot is always exactly `1.0`.
#[must_use]
pub fn file_progress(snapshot: &StageSnapshot) -> f64 {
    if matches!(snapshot, StageSnapshot::Completed(_)) {
        return 1.0;
    }

    let fraction = intrinsic_fraction(snapshot).unwrap_or(0.0);
    (base_progress(snapshot.stage()) + fraction * stage_weight()).clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(done: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| (done as f64 / total as f64).min(1.0))
}
