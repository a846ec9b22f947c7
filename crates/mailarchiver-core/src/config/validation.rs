//! Configuration validation.

use super::model::ArchiverConfig;
use crate::identity::ListIdentity;
use crate::normalize::is_usable_address;

/// Validation error for archiver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Shards must hold at least one record.
    ZeroShardSize,
    /// Unknown list address is empty or contains forbidden characters.
    InvalidUnknownListAddress,
    /// Unknown author address is empty or contains forbidden characters.
    InvalidUnknownAuthorAddress,
    /// Assorted bucket name is empty.
    EmptyAssortedBucket,
    /// Assorted bucket is not usable as a directory name.
    UnsafeAssortedBucket,
    /// Checkpoint interval of zero.
    ZeroCheckpointInterval,
    /// Index path is empty.
    EmptyIndexPath,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::ZeroShardSize => "Maximum records per shard must be at least 1",
            Self::InvalidUnknownListAddress => {
                "Unknown list address must be non-empty without spaces, quotes or angle brackets"
            }
            Self::InvalidUnknownAuthorAddress => {
                "Unknown author address must be non-empty without spaces, quotes or angle brackets"
            }
            Self::EmptyAssortedBucket => "Assorted bucket name is required",
            Self::UnsafeAssortedBucket => {
                "Assorted bucket name may only contain letters, digits and . _ @ + -"
            }
            Self::ZeroCheckpointInterval => "Checkpoint interval must be at least 1",
            Self::EmptyIndexPath => "Index path is required",
        }
    }

    /// Get the field name this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::ZeroShardSize => "max_records_per_shard",
            Self::InvalidUnknownListAddress => "unknown_list_address",
            Self::InvalidUnknownAuthorAddress => "unknown_author_address",
            Self::EmptyAssortedBucket | Self::UnsafeAssortedBucket => "assorted_bucket",
            Self::ZeroCheckpointInterval => "checkpoint_interval",
            Self::EmptyIndexPath => "index_path",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field(), self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating a configuration.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an archiver configuration.
///
/// Returns `Ok(())` if valid, or `Err(Vec<ValidationError>)` with all errors.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_config(config: &ArchiverConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.max_records_per_shard == 0 {
        errors.push(ValidationError::ZeroShardSize);
    }

    if !is_usable_address(&config.unknown_list_address) {
        errors.push(ValidationError::InvalidUnknownListAddress);
    }

    if !is_usable_address(&config.unknown_author_address) {
        errors.push(ValidationError::InvalidUnknownAuthorAddress);
    }

    if config.assorted_bucket.trim().is_empty() {
        errors.push(ValidationError::EmptyAssortedBucket);
    } else if !ListIdentity::is_safe(&config.assorted_bucket) {
        errors.push(ValidationError::UnsafeAssortedBucket);
    }

    if config.checkpoint_interval == Some(0) {
        errors.push(ValidationError::ZeroCheckpointInterval);
    }

    if config.index_path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyIndexPath);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ArchiverConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let config = ArchiverConfig {
            max_records_per_shard: 0,
            unknown_list_address: " ".into(),
            unknown_author_address: "no body@x".into(),
            assorted_bucket: String::new(),
            checkpoint_interval: Some(0),
            index_path: PathBuf::new(),
            ..ArchiverConfig::default()
        };

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::ZeroShardSize,
                ValidationError::InvalidUnknownListAddress,
                ValidationError::InvalidUnknownAuthorAddress,
                ValidationError::EmptyAssortedBucket,
                ValidationError::ZeroCheckpointInterval,
                ValidationError::EmptyIndexPath,
            ]
        );
    }

    #[test]
    fn test_unsafe_bucket_rejected() {
        let config = ArchiverConfig {
            assorted_bucket: "../escape".into(),
            ..ArchiverConfig::default()
        };
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::UnsafeAssortedBucket]
        );
    }

    #[test]
    fn test_display_names_field() {
        assert_eq!(
            ValidationError::ZeroShardSize.to_string(),
            "max_records_per_shard: Maximum records per shard must be at least 1"
        );
    }
}
