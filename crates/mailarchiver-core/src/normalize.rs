//! Header normalization.
//!
//! Turns often-malformed `From`, `Reply-To`, `Date` and `Subject` headers
//! into values that are safe to store in a commit: a decoded subject and an
//! author identity whose name and address never contain the `<`/`>`
//! delimiters of a git signature.

use std::sync::LazyLock;

use mailarchiver_mime::{Headers, MessageDate, parse_address, parse_date};
use regex::Regex;
use tracing::{debug, warn};

use crate::store::Signature;

/// `Name <addr>` inside a display name; group 1 is the name part.
#[allow(clippy::unwrap_used)]
static EMBEDDED_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*<.*>").unwrap());

/// `X via Y` relay rewriting (mailing lists munging `From` for DMARC).
#[allow(clippy::unwrap_used)]
static VIA_RELAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+) via .+").unwrap());

/// Characters that mark an address as corrupted.
const FORBIDDEN_ADDRESS_CHARS: &[char] = &['<', '>', '"', ' '];

/// Author identity derived from a message's headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Display name; never empty, never contains `<`, `>` or control characters.
    pub name: String,
    /// Address; never empty, never contains `<`, `>`, `"` or spaces.
    pub email: String,
    /// Parsed `Date` header.
    pub date: MessageDate,
}

impl Author {
    /// The author as a commit signature.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature {
            name: self.name.clone(),
            email: self.email.clone(),
            time: self.date.timestamp(),
            offset_minutes: self.date.offset_minutes(),
        }
    }
}

/// Returns `true` if `address` can be used in a signature as-is.
///
/// Besides the forbidden characters, control characters are rejected and
/// at least one letter or digit is required, since git trims punctuation
/// from signature fields and refuses empty ones.
#[must_use]
pub fn is_usable_address(address: &str) -> bool {
    !address.contains(FORBIDDEN_ADDRESS_CHARS)
        && !address.contains(char::is_control)
        && address.contains(char::is_alphanumeric)
}

/// Extracts author and subject from message headers.
#[derive(Debug, Clone)]
pub struct HeaderNormalizer {
    unknown_author_address: String,
}

impl HeaderNormalizer {
    /// Creates a normalizer substituting `unknown_author_address` for
    /// unusable `From` addresses.
    #[must_use]
    pub fn new(unknown_author_address: impl Into<String>) -> Self {
        Self {
            unknown_author_address: unknown_author_address.into(),
        }
    }

    /// Decodes a header value, falling back to the raw text.
    ///
    /// Line breaks and NUL bytes are removed either way.
    #[must_use]
    pub fn decode(value: &str) -> String {
        let decoded = Headers::decode_value(value).unwrap_or_else(|e| {
            warn!(value, error = %e, "Header decoding failed, keeping raw value");
            value.to_string()
        });
        decoded.replace(['\r', '\n', '\0'], "")
    }

    /// The decoded `Subject`, or an empty string.
    #[must_use]
    pub fn subject(headers: &Headers) -> String {
        headers.get("subject").map(Self::decode).unwrap_or_default()
    }

    /// Derives the author identity.
    #[must_use]
    pub fn author(&self, headers: &Headers) -> Author {
        let from = headers.get("from").map(Self::decode).unwrap_or_default();
        let mailbox = parse_address(&from);

        let mut name = EMBEDDED_ADDRESS
            .captures(&mailbox.name)
            .and_then(|caps| caps.get(1))
            .map_or(mailbox.name.as_str(), |m| m.as_str())
            .trim()
            .trim_matches('"')
            .to_string();
        let mut email = mailbox.email;

        if let Some(relayed) = VIA_RELAY
            .captures(&name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
        {
            if let Some(reply_to) = headers
                .get("reply-to")
                .map(|v| parse_address(&Self::decode(v)).email)
                .filter(|addr| !addr.is_empty())
            {
                email = reply_to;
            }
            debug!(from = %from, name = %relayed, email = %email, "Rewrote relayed sender");
            name = relayed;
        }

        let (name, email) = self.sanitize(name, email);
        let date = parse_date(headers.get("date"));

        Author { name, email, date }
    }

    /// Applies the address and name substitution rules.
    fn sanitize(&self, name: String, email: String) -> (String, String) {
        let email = if is_usable_address(&email) {
            email
        } else {
            warn!(email = %email, "Unusable author address, substituting sentinel");
            self.unknown_author_address.clone()
        };

        let name = if name.chars().any(char::is_alphabetic) {
            name
        } else {
            email.clone()
        };

        let name: String = name
            .chars()
            .filter(|c| !c.is_control() && *c != '<' && *c != '>')
            .collect();
        let name = name.trim().to_string();
        let name = if name.is_empty() { email.clone() } else { name };

        (name, email)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::non_ascii_literal)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SENTINEL: &str = "UNKNOWN@UNKNOWN.COM";

    fn normalizer() -> HeaderNormalizer {
        HeaderNormalizer::new(SENTINEL)
    }

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.add(*name, *value);
        }
        headers
    }

    #[test]
    fn test_plain_author() {
        let h = headers(&[
            ("From", "\"J. Doe\" <j@example.com>"),
            ("Date", "Mon, 1 Jan 2024 10:00:00 +0000"),
        ]);
        let author = normalizer().author(&h);
        assert_eq!(author.name, "J. Doe");
        assert_eq!(author.email, "j@example.com");
        assert_eq!(author.date.timestamp(), 1_704_103_200);
        assert_eq!(author.date.offset_minutes(), 0);
    }

    #[test]
    fn test_via_relay_uses_reply_to() {
        let h = headers(&[("From", "\"A via B\" <b@x>"), ("Reply-To", "a@y")]);
        let author = normalizer().author(&h);
        assert_eq!(author.name, "A");
        assert_eq!(author.email, "a@y");
    }

    #[test]
    fn test_via_relay_without_reply_to_keeps_address() {
        let h = headers(&[("From", "\"Alice Smith via dev\" <dev@lists.x>")]);
        let author = normalizer().author(&h);
        assert_eq!(author.name, "Alice Smith");
        assert_eq!(author.email, "dev@lists.x");
    }

    #[test]
    fn test_embedded_address_stripped_from_name() {
        let h = headers(&[("From", "\"Foo Bar <foo@x>\" <bar@y>")]);
        let author = normalizer().author(&h);
        assert_eq!(author.name, "Foo Bar");
        assert_eq!(author.email, "bar@y");
    }

    #[test]
    fn test_corrupted_address_replaced() {
        let h = headers(&[("From", "Broken <bro ken@x>")]);
        let author = normalizer().author(&h);
        assert_eq!(author.email, SENTINEL);
        assert_eq!(author.name, "Broken");
    }

    #[test]
    fn test_name_without_letters_becomes_email() {
        let h = headers(&[("From", "\"1234 !!\" <j@example.com>")]);
        let author = normalizer().author(&h);
        assert_eq!(author.name, "j@example.com");
    }

    #[test]
    fn test_missing_from_uses_sentinel_for_both() {
        let author = normalizer().author(&Headers::new());
        assert_eq!(author.email, SENTINEL);
        assert_eq!(author.name, SENTINEL);
        assert!(author.date.is_defaulted());
    }

    #[test]
    fn test_bare_address_name_is_address() {
        let h = headers(&[("From", "j@example.com")]);
        let author = normalizer().author(&h);
        assert_eq!(author.name, "j@example.com");
        assert_eq!(author.email, "j@example.com");
    }

    #[test]
    fn test_encoded_from() {
        let h = headers(&[("From", "=?utf-8?Q?Andr=C3=A9_M?= <andre@x>")]);
        let author = normalizer().author(&h);
        assert_eq!(author.name, "André M");
        assert_eq!(author.email, "andre@x");
    }

    #[test]
    fn test_subject_decoding_and_fallback() {
        let h = headers(&[("Subject", "=?utf-8?B?SMOpbGxv?=")]);
        assert_eq!(HeaderNormalizer::subject(&h), "Héllo");

        let h = headers(&[("Subject", "Re: =?utf-8?Q?caf=C3?= =?utf-8?Q?=A9?=")]);
        assert_eq!(HeaderNormalizer::subject(&h), "Re: café");

        let h = headers(&[("Subject", "=?x-unknown?Q?raw?=")]);
        assert_eq!(HeaderNormalizer::subject(&h), "=?x-unknown?Q?raw?=");

        assert_eq!(HeaderNormalizer::subject(&Headers::new()), "");
    }

    #[test]
    fn test_signature_carries_date() {
        let h = headers(&[
            ("From", "Jane <jane@x>"),
            ("Date", "Mon, 1 Jan 2024 10:00:00 -0130"),
        ]);
        let sig = normalizer().author(&h).signature();
        assert_eq!(sig.name, "Jane");
        assert_eq!(sig.email, "jane@x");
        assert_eq!(sig.offset_minutes, -90);
    }

    proptest! {
        #[test]
        fn prop_author_fields_are_signature_safe(from in ".*", reply_to in ".*") {
            let h = headers(&[("From", from.as_str()), ("Reply-To", reply_to.as_str())]);
            let author = normalizer().author(&h);
            prop_assert!(!author.name.is_empty());
            prop_assert!(!author.name.contains(['<', '>']));
            prop_assert!(is_usable_address(&author.email));
        }
    }
}
