//! Message header handling.

use crate::encoding::decode_rfc2047;
use crate::error::Result;
use std::collections::HashMap;

/// Collection of email headers.
///
/// Names are case-insensitive. Values are kept raw (still possibly
/// RFC 2047 encoded); folded lines are joined with a single space.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.entry(name).or_default().push(value);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if the header's first value is `yes`, ignoring case
    /// and surrounding whitespace.
    #[must_use]
    pub fn is_yes(&self, name: &str) -> bool {
        self.get(name)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("yes"))
    }

    /// Parses headers from raw text.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    /// Continuation: line
    ///  folded onto the next line
    /// ```
    ///
    /// Parsing stops at the first empty line. Lines without a colon outside
    /// of a continuation are ignored, as mailers in the wild emit them.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();
        let mut current_name: Option<String> = None;
        let mut current_value = String::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            // Check for continuation line (starts with space or tab)
            if line.starts_with(' ') || line.starts_with('\t') {
                if current_name.is_some() {
                    current_value.push(' ');
                    current_value.push_str(line.trim());
                }
            } else {
                // Save previous header if exists
                if let Some(name) = current_name.take() {
                    headers.add(name, current_value.trim().to_string());
                    current_value.clear();
                }

                if let Some((name, value)) = line.split_once(':') {
                    current_name = Some(name.trim().to_string());
                    current_value = value.trim().to_string();
                }
            }
        }

        if let Some(name) = current_name {
            headers.add(name, current_value.trim().to_string());
        }

        headers
    }

    /// Parses the header section of a raw message.
    ///
    /// Bytes that are not valid UTF-8 are replaced, since only the decoded
    /// header text is interpreted; the raw bytes are archived untouched.
    #[must_use]
    pub fn parse_bytes(raw: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(header_section(raw)))
    }

    /// Decodes a header value from RFC 2047 if encoded.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_value(value: &str) -> Result<String> {
        decode_rfc2047(value)
    }
}

/// Returns the bytes up to (not including) the blank line ending the headers.
fn header_section(raw: &[u8]) -> &[u8] {
    let mut line_start = 0;
    for (i, byte) in raw.iter().enumerate() {
        if *byte == b'\n' {
            let line = &raw[line_start..i];
            if line.is_empty() || line == b"\r" {
                return &raw[..line_start];
            }
            line_start = i + 1;
        }
    }
    raw
}
