//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Git object store operation failed.
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// Message could not be read or interpreted.
    #[error("Message error: {0}")]
    Mime(#[from] mailarchiver_mime::Error),

    /// Configuration file could not be parsed.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ingestion index could not be loaded or persisted.
    #[error("Index error at {path}: {source}")]
    Index {
        /// Index file location.
        path: PathBuf,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The mail root does not exist or is not a directory.
    #[error("Mail root not found: {0}")]
    MailRootNotFound(PathBuf),

    /// The archive root holds something that is not an archive.
    #[error("Invalid archive layout: {0}")]
    InvalidLayout(String),

    /// The message has no `Message-Id` header and cannot be archived.
    #[error("Message has no Message-Id header")]
    MissingMessageId,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
