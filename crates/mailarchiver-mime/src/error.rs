//! Error types for message parsing.

/// Result type alias for message parsing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message parsing error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid encoding.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Charset label not recognised.
    #[error("Unknown charset: {0}")]
    UnknownCharset(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// I/O error while reading a message file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
