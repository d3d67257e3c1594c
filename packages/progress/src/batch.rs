//! File position tracking for runs that span several files.
//!
//! Producers announce each file with [`BatchCoordinator::update_current_file`].
//! Announcing a file does not move the pipeline; the next stage-advancing
//! report starts that file's pipeline (see [`crate::transition`]), at which
//! point [`BatchCoordinator::begin_pending_file`] records it as the file the
//! stage detail belongs to.

use bulk_import_progress_models::BatchInfo;

/// Tracks which file of a run is being processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchCoordinator {
    info: BatchInfo,
    /// File whose pipeline the current stage detail describes.
    pipeline_file_index: usize,
}

impl BatchCoordinator {
    /// Coordinator for a run over `total_files` files.
    #[must_use]
    pub const fn new(total_files: usize) -> Self {
        Self {
            info: BatchInfo::new(total_files),
            pipeline_file_index: 0,
        }
    }

    /// Coordinator for a single-file run.
    #[must_use]
    pub const fn single() -> Self {
        Self::new(1)
    }

    #[must_use]
    pub const fn info(&self) -> &BatchInfo {
        &self.info
    }

    #[must_use]
    pub const fn pipeline_file_index(&self) -> usize {
        self.pipeline_file_index
    }

    /// Records the file now being processed.
    ///
    /// Files are processed in order, so an index outside the run or below
    /// the current one is a stale report and is ignored. Returns whether
    /// anything changed.
    pub fn update_current_file(&mut self, index: usize, name: &str) -> bool {
        if index >= self.info.total_files {
            log::debug!(
                "Ignoring file {index} ({name}): run has {} files",
                self.info.total_files
            );
            return false;
        }
        if index < self.info.current_file_index {
            log::debug!(
                "Ignoring file {index} ({name}): already on file {}",
                self.info.current_file_index
            );
            return false;
        }
        if index == self.info.current_file_index && name == self.info.current_file_name {
            return false;
        }

        self.info.current_file_index = index;
        self.info.current_file_name = name.to_string();
        true
    }

    /// Whether a file has been announced whose pipeline has not started.
    #[must_use]
    pub const fn has_pending_file(&self) -> bool {
        self.info.current_file_index > self.pipeline_file_index
    }

    /// Marks the announced file's pipeline as started.
    pub const fn begin_pending_file(&mut self) {
        self.pipeline_file_index = self.info.current_file_index;
    }

    /// Overall run progress for the given per-file progress.
    ///
    /// Each file is an equal share of the run:
    /// `(file_index + file_progress) / total_files`. The file index only
    /// moves forward within a run, so this never decreases while file
    /// progress does not.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn overall_progress(&self, file_progress: f64, completed: bool) -> f64 {
        if completed {
            return 1.0;
        }

        let done_files = self.pipeline_file_index as f64;
        ((done_files + file_progress) / self.info.total_files as f64).clamp(0.0, 1.0)
    }
}
