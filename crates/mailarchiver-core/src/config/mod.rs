//! Archiver configuration.
//!
//! Provides the run settings, their JSON file format, and validation.

mod model;
mod validation;

use std::path::Path;

use crate::{Error, Result};

pub use model::{
    ArchiverConfig, DEFAULT_ASSORTED_BUCKET, DEFAULT_MAX_RECORDS_PER_SHARD,
    DEFAULT_UNKNOWN_AUTHOR_ADDRESS, DEFAULT_UNKNOWN_LIST_ADDRESS, IndexKeyScheme,
};
pub use validation::{ValidationError, ValidationResult, validate_config};

impl ArchiverConfig {
    /// Loads a configuration from a JSON file.
    ///
    /// Fields missing from the file keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid JSON
    /// for this structure.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Checks the configuration, folding every problem into one error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] listing all invalid fields.
    pub fn validate(&self) -> Result<()> {
        validate_config(self).map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            Error::Config(messages.join("; "))
        })
    }
}
