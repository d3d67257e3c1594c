//! Stage ordering rules.
//!
//! Decides whether a report may be applied given the stage the pipeline is
//! in. Nothing here mutates state; [`classify`] only returns the verdict.
//!
//! Within a file's pipeline stages only ever move forward. A batch run
//! restarts the pipeline for each file: once a later file has been
//! announced, the next advancing report begins that file at whatever stage
//! it names.

use bulk_import_progress_models::Stage;

use crate::update::ProgressUpdate;

/// Verdict for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the report's stage within the current file.
    Advance,
    /// Begin the announced file's pipeline at the report's stage.
    StartFile,
    /// Add detail to the active stage.
    Refine,
    /// Record the batch position.
    Position,
    /// Drop the report.
    Ignore(IgnoreReason),
}

/// Why a report was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No run is underway.
    NoActiveRun,
    /// The run already completed.
    RunCompleted,
    /// An advancing report for a stage the pipeline has already reached.
    NotForward { current: Stage, requested: Stage },
    /// A refining report for a stage that is not active.
    StageMismatch { current: Stage, expected: Stage },
}

/// Classifies `update` against the `current` stage.
///
/// `pending_file` is whether a batch run has announced a file whose
/// pipeline has not started yet.
///
/// Advancing reports move the pipeline forward from any active stage, but
/// not out of idle: only a start opens a run, so an advancing report that
/// arrives while idle is dropped like any other. This is a deliberate
/// narrowing: a worker outliving a reset must not resurrect a run with no
/// start time or epoch of its own.
#[must_use]
pub fn classify(current: Stage, pending_file: bool, update: &ProgressUpdate) -> Transition {
    match current {
        Stage::Idle => return Transition::Ignore(IgnoreReason::NoActiveRun),
        Stage::Completed => return Transition::Ignore(IgnoreReason::RunCompleted),
        Stage::Reading | Stage::Parsing | Stage::Importing | Stage::Indexing => {}
    }

    if let Some(expected) = update.refines() {
        return if current == expected {
            Transition::Refine
        } else {
            Transition::Ignore(IgnoreReason::StageMismatch { current, expected })
        };
    }

    let Some(requested) = update.advances_to() else {
        return Transition::Position;
    };

    if pending_file && requested != Stage::Completed {
        Transition::StartFile
    } else if requested > current {
        Transition::Advance
    } else {
        Transition::Ignore(IgnoreReason::NotForward { current, requested })
    }
}
