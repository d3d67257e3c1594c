//! Progress configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration. The indexing status lines can also be set with the
//! `BULK_IMPORT_INDEXING_MESSAGE` and
//! `BULK_IMPORT_INCREMENTAL_INDEXING_MESSAGE` environment variables, which
//! take precedence over the file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Environment variable overriding [`ProgressConfig::indexing_message`].
pub const INDEXING_MESSAGE_ENV: &str = "BULK_IMPORT_INDEXING_MESSAGE";

/// Environment variable overriding
/// [`ProgressConfig::incremental_indexing_message`].
pub const INCREMENTAL_INDEXING_MESSAGE_ENV: &str = "BULK_IMPORT_INCREMENTAL_INDEXING_MESSAGE";

/// Default status line when index rebuilding begins.
pub const DEFAULT_INDEXING_MESSAGE: &str = "Building indexes...";

/// Default status line for incremental index maintenance.
pub const DEFAULT_INCREMENTAL_INDEXING_MESSAGE: &str = "Updating indexes incrementally...";

/// Tunables for the progress core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressConfig {
    /// Status line shown when indexing begins.
    pub indexing_message: String,
    /// Status line shown for incremental indexing.
    pub incremental_indexing_message: String,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            indexing_message: DEFAULT_INDEXING_MESSAGE.to_string(),
            incremental_indexing_message: DEFAULT_INCREMENTAL_INDEXING_MESSAGE.to_string(),
        }
    }
}

impl ProgressConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML or
    /// contains unknown keys, or [`ConfigError::InvalidValue`] if a status
    /// line is blank.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()
    }

    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] / [`ConfigError::InvalidValue`] if its
    /// contents are invalid.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded progress config from {}", path.display());
        Ok(config)
    }

    /// Applies overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if an override is set but
    /// blank.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(
            std::env::var(INDEXING_MESSAGE_ENV).ok().as_deref(),
            std::env::var(INCREMENTAL_INDEXING_MESSAGE_ENV)
                .ok()
                .as_deref(),
        )
    }

    /// Replaces the indexing status lines that are given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a given value is blank.
    pub fn with_overrides(
        mut self,
        indexing_message: Option<&str>,
        incremental_indexing_message: Option<&str>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = indexing_message {
            self.indexing_message = non_blank(INDEXING_MESSAGE_ENV, value)?;
            log::info!("Indexing message overridden to {:?}", self.indexing_message);
        }
        if let Some(value) = incremental_indexing_message {
            self.incremental_indexing_message =
                non_blank(INCREMENTAL_INDEXING_MESSAGE_ENV, value)?;
            log::info!(
                "Incremental indexing message overridden to {:?}",
                self.incremental_indexing_message
            );
        }
        Ok(self)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        non_blank("indexing_message", &self.indexing_message)?;
        non_blank(
            "incremental_indexing_message",
            &self.incremental_indexing_message,
        )?;
        Ok(self)
    }
}

/// A status line must have something to show.
fn non_blank(key: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "status line must not be blank".to_string(),
        });
    }
    Ok(trimmed.to_string())
}
