//! Header value decoding.
//!
//! Supports RFC 2047 encoded words (`=?charset?B|Q?text?=`) in any charset
//! that `encoding_rs` recognises.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use encoding_rs::Encoding;

/// Decodes Base64 data.
///
/// Missing padding is tolerated, since mailers frequently drop it inside
/// encoded words.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(&cleaned).or_else(|_| {
        STANDARD_NO_PAD
            .decode(cleaned.trim_end_matches('='))
            .map_err(Into::into)
    })
}

/// Decodes the RFC 2047 "Q" encoding into raw bytes.
///
/// Like quoted-printable, except that `_` always stands for a space.
///
/// # Errors
///
/// Returns an error if the input contains an invalid escape sequence.
pub fn decode_q(text: &str) -> Result<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".into()))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
                result.push(byte);
                i += 3;
            }
            other => {
                result.push(other);
                i += 1;
            }
        }
    }

    Ok(result)
}

/// One syntactically well-formed encoded word found in a header value.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    text: &'a str,
    /// Length of the whole `=?...?=` token in bytes.
    len: usize,
}

impl<'a> EncodedWord<'a> {
    /// Parses an encoded word at the very start of `input`.
    ///
    /// Returns `None` when `input` does not begin with a well-formed token,
    /// in which case the `=?` is ordinary text.
    fn parse(input: &'a str) -> Option<Self> {
        let inner = input.strip_prefix("=?")?;
        let (charset, rest) = inner.split_once('?')?;
        let (encoding, rest) = rest.split_once('?')?;
        let end = rest.find("?=")?;
        let text = &rest[..end];

        if charset.is_empty()
            || encoding.len() != 1
            || text.contains(char::is_whitespace)
            || charset.contains(char::is_whitespace)
        {
            return None;
        }

        let len = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
        Some(Self {
            charset,
            encoding,
            text,
            len,
        })
    }

    /// The payload bytes, before charset decoding.
    fn payload(&self) -> Result<Vec<u8>> {
        match self.encoding {
            "B" | "b" => decode_base64(self.text),
            "Q" | "q" => decode_q(self.text),
            other => Err(Error::InvalidEncoding(format!("Unknown encoding: {other}"))),
        }
    }

    fn charset(&self) -> Result<&'static Encoding> {
        // RFC 2231 allows a language suffix: `utf-8*en`.
        let label = self.charset.split('*').next().unwrap_or(self.charset);
        Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::UnknownCharset(self.charset.to_string()))
    }
}

/// Payload of a run of adjacent encoded words sharing a charset.
///
/// Mailers split long text at byte boundaries, so one multibyte character
/// can straddle two words. It only decodes once their bytes are joined.
#[derive(Default)]
struct PendingRun {
    charset: Option<&'static Encoding>,
    bytes: Vec<u8>,
}

impl PendingRun {
    fn flush_into(&mut self, out: &mut String) {
        if let Some(charset) = self.charset.take() {
            let (decoded, _, _) = charset.decode(&self.bytes);
            out.push_str(&decoded);
            self.bytes.clear();
        }
    }
}

/// Decodes RFC 2047 encoded words anywhere in a header value.
///
/// Plain text between encoded words is preserved, while whitespace that only
/// separates two adjacent encoded words is dropped. Adjacent words in the same
/// charset are decoded as one byte sequence. Text that merely looks like the
/// start of an encoded word is kept verbatim.
///
/// # Errors
///
/// Returns an error if an encoded word uses an unknown charset or encoding,
/// or if its payload cannot be decoded.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    let mut previous_was_encoded = false;
    let mut run = PendingRun::default();

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        if let Some(word) = EncodedWord::parse(candidate) {
            let charset = word.charset()?;
            let payload = word.payload()?;
            let adjacent = previous_was_encoded && before.trim().is_empty();

            if !adjacent || run.charset != Some(charset) {
                run.flush_into(&mut result);
            }
            if !adjacent {
                result.push_str(before);
            }
            run.charset = Some(charset);
            run.bytes.extend_from_slice(&payload);
            rest = &candidate[word.len..];
            previous_was_encoded = true;
        } else {
            run.flush_into(&mut result);
            result.push_str(before);
            result.push_str("=?");
            rest = &candidate[2..];
            previous_was_encoded = false;
        }
    }

    run.flush_into(&mut result);
    result.push_str(rest);
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::non_ascii_literal)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decode() {
        assert_eq!(decode_base64("SGVsbG8sIFdvcmxkIQ==").unwrap(), b"Hello, World!");
        assert_eq!(decode_base64("SGVsbG8sIFdvcmxkIQ").unwrap(), b"Hello, World!");
        assert!(decode_base64("!!!").is_err());
    }

    #[test]
    fn test_q_decode() {
        assert_eq!(decode_q("H=C3=A9llo_World").unwrap(), "Héllo World".as_bytes());
        assert!(decode_q("broken=4").is_err());
        assert!(decode_q("broken=ZZ").is_err());
    }

    #[test]
    fn test_rfc2047_plain_text_passthrough() {
        assert_eq!(decode_rfc2047("Hello").unwrap(), "Hello");
        assert_eq!(decode_rfc2047("a =? b").unwrap(), "a =? b");
    }

    #[test]
    fn test_rfc2047_base64_word() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_rfc2047_q_word_latin1() {
        assert_eq!(
            decode_rfc2047("=?ISO-8859-1?Q?Andr=E9?= Pirard").unwrap(),
            "André Pirard"
        );
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        let value = "=?utf-8?Q?Hello_?= \r\n =?utf-8?Q?World?=";
        assert_eq!(decode_rfc2047(value).unwrap(), "Hello World");
    }

    #[test]
    fn test_rfc2047_character_split_across_words() {
        // "é" is C3 A9 in UTF-8, one byte per word.
        assert_eq!(decode_rfc2047("=?utf-8?B?ww==?= =?utf-8?B?qQ==?=").unwrap(), "é");
        assert_eq!(
            decode_rfc2047("=?UTF-8?Q?=C3?=\r\n =?utf8?Q?=A9t=C3=A9?=").unwrap(),
            "été"
        );
    }

    #[test]
    fn test_rfc2047_charset_change_between_words() {
        let value = "=?iso-8859-1?Q?=E9?= =?utf-8?Q?=C3=A9?= x =?utf-8?Q?=C3=A9?=";
        assert_eq!(decode_rfc2047(value).unwrap(), "éé x é");
    }

    #[test]
    fn test_rfc2047_mixed_with_plain_text() {
        let value = "Re: =?utf-8?B?SMOpbGxv?= there";
        assert_eq!(decode_rfc2047(value).unwrap(), "Re: Héllo there");
    }

    #[test]
    fn test_rfc2047_language_suffix() {
        assert_eq!(decode_rfc2047("=?utf-8*en?Q?hi?=").unwrap(), "hi");
    }

    #[test]
    fn test_rfc2047_unknown_charset_fails() {
        assert!(matches!(
            decode_rfc2047("=?x-klingon?Q?abc?="),
            Err(Error::UnknownCharset(_))
        ));
    }

    #[test]
    fn test_rfc2047_unknown_encoding_fails() {
        assert!(matches!(
            decode_rfc2047("=?utf-8?X?abc?="),
            Err(Error::InvalidEncoding(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_decode_never_panics(input in ".*") {
            let _ = decode_rfc2047(&input);
        }

        #[test]
        fn prop_plain_text_unchanged(input in "[^=]*") {
            proptest::prop_assert_eq!(decode_rfc2047(&input).unwrap(), input);
        }
    }
}
