#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Import pipeline stages, per-stage progress payloads, and the snapshot
//! handed to display layers.
//!
//! A bulk import runs through a fixed sequence of [`Stage`]s. Whatever the
//! producers last reported about the active stage is carried by a
//! [`StageSnapshot`], whose variant *is* the stage, so the two can never
//! disagree.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A phase of the import pipeline.
///
/// Declaration order is the canonical pipeline order, so `Ord` compares
/// stages by how far along the pipeline they are.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    /// No run in progress.
    #[default]
    Idle,
    /// Opening and reading the input file.
    Reading,
    /// Parsing records across worker threads.
    Parsing,
    /// Writing parsed records in batches.
    Importing,
    /// Rebuilding indexes over the imported data.
    Indexing,
    /// The run finished.
    Completed,
}

impl Stage {
    /// Every stage in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::Idle,
        Self::Reading,
        Self::Parsing,
        Self::Importing,
        Self::Indexing,
        Self::Completed,
    ];

    /// Number of stages that count towards completion (`Idle` excluded).
    pub const STEP_COUNT: u8 = 5;

    /// Position of the stage in the pipeline, `Idle` being 0.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Reading => 1,
            Self::Parsing => 2,
            Self::Importing => 3,
            Self::Indexing => 4,
            Self::Completed => 5,
        }
    }

    /// Whether a run is underway in this stage (not idle, not finished).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Reading | Self::Parsing | Self::Importing | Self::Indexing
        )
    }

    /// Short human-readable name of the stage.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Reading => "Reading file",
            Self::Parsing => "Parsing records",
            Self::Importing => "Importing batches",
            Self::Indexing => "Building indexes",
            Self::Completed => "Completed",
        }
    }
}

/// Record counts reported while parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingDetail {
    /// Records parsed so far.
    pub processed_records: u64,
    /// Records expected in the file. Zero when unknown.
    pub total_records: u64,
    /// Parse workers currently running.
    pub active_workers: u32,
}

/// Batch and record counts reported while writing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportingDetail {
    /// Batches written so far.
    pub current_batch: u64,
    /// Batches expected. Zero when unknown.
    pub total_batches: u64,
    /// Records written so far.
    pub records_processed: u64,
    /// Records expected across all batches.
    pub total_records: u64,
}

/// Final statistics of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStats {
    /// Wall-clock seconds between the run start and its completion.
    pub duration_seconds: f64,
    /// Records written by the run.
    pub records_imported: u64,
    /// Whole records written per second.
    pub records_per_second: u64,
}

/// What is currently known about the active stage.
///
/// Each variant carries only the fields that make sense for its stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageSnapshot {
    /// Nothing running.
    #[default]
    Idle,
    /// Reading the input. Indeterminate.
    Reading,
    /// Parsing records.
    Parsing(ParsingDetail),
    /// Writing batches.
    Importing(ImportingDetail),
    /// Rebuilding indexes. Indeterminate, described by free text.
    Indexing {
        /// Description of the index operation in flight.
        operation: String,
    },
    /// Run finished.
    Completed(CompletionStats),
}

impl StageSnapshot {
    /// The stage this snapshot describes.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Idle => Stage::Idle,
            Self::Reading => Stage::Reading,
            Self::Parsing(_) => Stage::Parsing,
            Self::Importing(_) => Stage::Importing,
            Self::Indexing { .. } => Stage::Indexing,
            Self::Completed(_) => Stage::Completed,
        }
    }
}

/// Generation counter distinguishing one run from the next.
///
/// Bumped on every start and every reset. Updates issued under an older
/// epoch are dropped.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RunEpoch(pub u64);

impl RunEpoch {
    /// The epoch following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for RunEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which file of a run is being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInfo {
    /// Files in the run. Always at least 1.
    pub total_files: usize,
    /// Zero-based index of the file being processed.
    pub current_file_index: usize,
    /// Name of the file being processed. Empty until announced.
    pub current_file_name: String,
}

impl BatchInfo {
    /// Batch info for a run over `total_files` files (at least one).
    #[must_use]
    pub const fn new(total_files: usize) -> Self {
        Self {
            total_files: if total_files == 0 { 1 } else { total_files },
            current_file_index: 0,
            current_file_name: String::new(),
        }
    }

    /// Batch info for a single-file run.
    #[must_use]
    pub const fn single() -> Self {
        Self::new(1)
    }

    /// Whether the run spans more than one file.
    #[must_use]
    pub const fn is_batch_import(&self) -> bool {
        self.total_files > 1
    }
}

impl Default for BatchInfo {
    fn default() -> Self {
        Self::single()
    }
}

/// Read-only view of the run, published after every accepted update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    /// Run this snapshot belongs to.
    pub epoch: RunEpoch,
    /// Completion of the whole run in `[0, 1]`.
    pub overall_progress: f64,
    /// Completion of the current file's pipeline in `[0, 1]`.
    pub file_progress: f64,
    /// Detail of the active stage.
    pub stage_snapshot: StageSnapshot,
    /// Human-readable status line for the active stage.
    pub status_text: String,
    /// Stage-local completion, `None` while the stage is indeterminate.
    pub stage_fraction: Option<f64>,
    /// Whether a run is underway.
    pub is_importing: bool,
    /// File position within the run.
    pub batch: BatchInfo,
}

impl ProgressSnapshot {
    /// The active stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage_snapshot.stage()
    }

    /// Whether the run spans more than one file.
    #[must_use]
    pub const fn is_batch_import(&self) -> bool {
        self.batch.is_batch_import()
    }

    #[must_use]
    pub const fn current_file_index(&self) -> usize {
        self.batch.current_file_index
    }

    #[must_use]
    pub const fn total_files(&self) -> usize {
        self.batch.total_files
    }

    #[must_use]
    pub fn current_file_name(&self) -> &str {
        &self.batch.current_file_name
    }

    /// Final statistics, once the run has completed.
    #[must_use]
    pub const fn completion(&self) -> Option<&CompletionStats> {
        match &self.stage_snapshot {
            StageSnapshot::Completed(stats) => Some(stats),
            _ => None,
        }
    }
}
