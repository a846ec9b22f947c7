//! Raw message loading.

use crate::error::Result;
use crate::header::Headers;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A message as stored on disk: parsed headers plus the verbatim bytes.
///
/// The bytes are never rewritten; archives store exactly what was read.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Parsed header section.
    pub headers: Headers,
    /// The complete message, headers and body.
    pub bytes: Vec<u8>,
}

impl RawMessage {
    /// Wraps raw message bytes, parsing their header section.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            headers: Headers::parse_bytes(&bytes),
            bytes,
        }
    }

    /// Reads a whole message file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_bytes(std::fs::read(path)?))
    }

    /// Reads only the header section of a message file.
    ///
    /// Stops at the blank line separating headers from the body, so large
    /// messages are not pulled into memory just to be sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn read_headers(path: impl AsRef<Path>) -> Result<Headers> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut section = Vec::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if line == b"\n" || line == b"\r\n" {
                break;
            }
            section.extend_from_slice(&line);
        }

        Ok(Headers::parse_bytes(&section))
    }

    /// The `Message-Id` header, if present and non-blank.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers
            .get("message-id")
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"Message-Id: <1@x>\r\nSubject: Hi\r\n\r\nBody line\r\nX-Not: header\r\n";

    #[test]
    fn test_from_bytes_keeps_verbatim_bytes() {
        let message = RawMessage::from_bytes(SAMPLE.to_vec());
        assert_eq!(message.bytes, SAMPLE);
        assert_eq!(message.message_id(), Some("<1@x>"));
        assert_eq!(message.headers.get("subject"), Some("Hi"));
        assert_eq!(message.headers.get("x-not"), None);
    }

    #[test]
    fn test_blank_message_id_is_absent() {
        let message = RawMessage::from_bytes(b"Message-Id:   \nSubject: x\n\n".to_vec());
        assert_eq!(message.message_id(), None);
    }

    #[test]
    fn test_load_and_read_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("msg");
        std::fs::write(&path, SAMPLE).unwrap();

        let message = RawMessage::load(&path).unwrap();
        assert_eq!(message.bytes, SAMPLE);

        let headers = RawMessage::read_headers(&path).unwrap();
        assert_eq!(headers.get("message-id"), Some("<1@x>"));
        assert_eq!(headers.get("x-not"), None);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RawMessage::load(dir.path().join("nope")).is_err());
    }
}
