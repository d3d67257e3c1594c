//! Reports that producers send to the core.

use bulk_import_progress_models::Stage;

/// A single progress report from the import engine.
///
/// Advancing reports move the pipeline to a new stage. Refining reports
/// add detail to the stage that is already active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// A batch run moved on to another file.
    CurrentFile { index: usize, name: String },
    /// Reading (or, in a batch, re-reading for the next file) began.
    ToReading,
    /// Parsing began.
    ToParsing { total_records: u64, worker_count: u32 },
    /// More records were parsed.
    ParsingProgress {
        processed_records: u64,
        worker_count: u32,
    },
    /// Batched writing began.
    ToImporting { total_batches: u64 },
    /// Another batch was written.
    ImportingProgress {
        current_batch: u64,
        records_processed: u64,
    },
    /// Index rebuilding began.
    ToIndexing,
    /// The index operation in flight changed.
    IndexingOperation { description: String },
    /// Indexes are being updated incrementally rather than rebuilt.
    IncrementalIndexing,
    /// The run finished.
    Complete { records_imported: u64 },
}

impl ProgressUpdate {
    /// Stage this report moves the pipeline to, for advancing reports.
    #[must_use]
    pub const fn advances_to(&self) -> Option<Stage> {
        match self {
            Self::ToReading => Some(Stage::Reading),
            Self::ToParsing { .. } => Some(Stage::Parsing),
            Self::ToImporting { .. } => Some(Stage::Importing),
            Self::ToIndexing => Some(Stage::Indexing),
            Self::Complete { .. } => Some(Stage::Completed),
            Self::CurrentFile { .. }
            | Self::ParsingProgress { .. }
            | Self::ImportingProgress { .. }
            | Self::IndexingOperation { .. }
            | Self::IncrementalIndexing => None,
        }
    }

    /// Stage this report refines, for refining reports.
    #[must_use]
    pub const fn refines(&self) -> Option<Stage> {
        match self {
            Self::ParsingProgress { .. } => Some(Stage::Parsing),
            Self::ImportingProgress { .. } => Some(Stage::Importing),
            Self::IndexingOperation { .. } | Self::IncrementalIndexing => Some(Stage::Indexing),
            Self::CurrentFile { .. }
            | Self::ToReading
            | Self::ToParsing { .. }
            | Self::ToImporting { .. }
            | Self::ToIndexing
            | Self::Complete { .. } => None,
        }
    }

    /// Short name used in log lines.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CurrentFile { .. } => "current-file",
            Self::ToReading => "to-reading",
            Self::ToParsing { .. } => "to-parsing",
            Self::ParsingProgress { .. } => "parsing-progress",
            Self::ToImporting { .. } => "to-importing",
            Self::ImportingProgress { .. } => "importing-progress",
            Self::ToIndexing => "to-indexing",
            Self::IndexingOperation { .. } => "indexing-operation",
            Self::IncrementalIndexing => "incremental-indexing",
            Self::Complete { .. } => "complete",
        }
    }
}
