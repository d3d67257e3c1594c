#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Progress tracking for bulk imports.
//!
//! An import engine moves each file through `reading -> parsing ->
//! importing -> indexing` and finally completes the run. Background
//! workers report what they are doing through a [`RunReporter`]; the
//! [`ImportProgressCore`] validates each report against the stage order,
//! folds it into a single completion fraction, and publishes an immutable
//! [`ProgressSnapshot`] that a display layer can poll or subscribe to.
//!
//! Out-of-order, stale, or otherwise invalid reports are dropped silently.
//! Producers running concurrently cannot always guarantee ordering, so the
//! core never turns a late report into an error.

pub mod aggregate;
pub mod batch;
pub mod clock;
pub mod config;
pub mod format;
pub mod stats;
pub mod tracker;
pub mod transition;
pub mod update;

pub use batch::BatchCoordinator;
pub use bulk_import_progress_models::{
    BatchInfo, CompletionStats, ImportingDetail, ParsingDetail, ProgressSnapshot, RunEpoch, Stage,
    StageSnapshot,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ProgressConfig;
pub use tracker::{ImportProgressCore, RunReporter};
pub use update::ProgressUpdate;

/// Errors that can occur while loading progress configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`ProgressConfig`].
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A configuration value was empty or unusable.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// The configuration key or environment variable.
        key: String,
        /// Description of what went wrong.
        message: String,
    },
}
