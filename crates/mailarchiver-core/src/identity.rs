//! List identity resolution.
//!
//! Decides which archive a message belongs to and which address is recorded
//! as the list's posting address.

use std::fmt;

use mailarchiver_mime::Headers;
use tracing::warn;

use crate::normalize::is_usable_address;

/// Headers naming the list, in priority order.
const ROUTING_HEADERS: &[&str] = &["list-id", "x-mailing-list", "x-original-to", "sender"];

/// Headers whose `yes` value sends a message to the assorted bucket.
const ADMINISTRATIVE_HEADERS: &[&str] = &["x-no-archive", "x-list-administrivia"];

/// Preferred source for the posting address.
const POSTING_HEADER: &str = "list-post";

/// Name of a list archive.
///
/// Always safe to use as a directory name and inside a git ref or
/// signature: only ASCII letters, digits and `. _ @ + -`, never starting
/// with a dot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListIdentity(String);

impl ListIdentity {
    /// Builds an identity from a header-derived value, replacing unsafe
    /// characters with `_`.
    ///
    /// Returns `None` if nothing usable remains.
    #[must_use]
    pub fn sanitize(raw: &str) -> Option<Self> {
        let cleaned: String = raw
            .trim()
            .chars()
            .map(|c| if is_safe_char(c) { c } else { '_' })
            .collect();
        let cleaned = cleaned.trim_start_matches('.');

        if cleaned.is_empty() {
            None
        } else {
            Some(Self(cleaned.to_string()))
        }
    }

    /// Returns `true` if `name` is already a valid identity as written.
    #[must_use]
    pub fn is_safe(name: &str) -> bool {
        !name.is_empty() && !name.starts_with('.') && name.chars().all(is_safe_char)
    }

    /// The identity as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '+' | '-')
}

/// Resolves list identities and posting addresses from headers.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    unknown_list_address: String,
    assorted_bucket: ListIdentity,
    unknown_list: ListIdentity,
}

impl IdentityResolver {
    /// Creates a resolver with the given fallbacks.
    ///
    /// Unsafe characters in either fallback are replaced, so the resolver
    /// never yields an unusable identity.
    #[must_use]
    pub fn new(unknown_list_address: &str, assorted_bucket: &str) -> Self {
        let unknown_list = ListIdentity::sanitize(unknown_list_address)
            .unwrap_or_else(|| ListIdentity("unknown".to_string()));
        let assorted_bucket =
            ListIdentity::sanitize(assorted_bucket).unwrap_or_else(|| unknown_list.clone());

        Self {
            unknown_list_address: unknown_list_address.trim().to_string(),
            assorted_bucket,
            unknown_list,
        }
    }

    /// Returns the archive a message is routed to.
    #[must_use]
    pub fn resolve(&self, headers: &Headers) -> ListIdentity {
        if is_administrative(headers) {
            return self.assorted_bucket.clone();
        }

        self.routing_address(headers)
            .and_then(|address| ListIdentity::sanitize(&address))
            .unwrap_or_else(|| self.unknown_list.clone())
    }

    /// Returns the list's posting address, recorded as committer email.
    ///
    /// `List-Post` wins; otherwise the routing address is used, ignoring
    /// the administrative override. An address that cannot appear in a
    /// signature is replaced by the unknown list address.
    #[must_use]
    pub fn posting_address(&self, headers: &Headers) -> String {
        let address = headers
            .get(POSTING_HEADER)
            .and_then(extract_address)
            .or_else(|| self.routing_address(headers));

        match address {
            Some(address) if is_usable_address(&address) => address,
            Some(address) => {
                warn!(address = %address, "Unusable posting address, substituting sentinel");
                self.unknown_list_address.clone()
            }
            None => self.unknown_list_address.clone(),
        }
    }

    /// First usable value among [`ROUTING_HEADERS`].
    fn routing_address(&self, headers: &Headers) -> Option<String> {
        ROUTING_HEADERS
            .iter()
            .find_map(|name| headers.get(name).and_then(extract_address))
    }
}

/// Returns `true` if the message is marked administrative or no-archive.
#[must_use]
pub fn is_administrative(headers: &Headers) -> bool {
    ADMINISTRATIVE_HEADERS.iter().any(|name| headers.is_yes(name))
}

/// Extracts the address from a list header value.
///
/// Takes the last `<...>` token if there is one, drops a `mailto:` scheme, then
/// takes an inner `<...>` token again (`mailto:<x@y>` does occur).
fn extract_address(value: &str) -> Option<String> {
    let token = bracketed(value).unwrap_or(value).trim();
    let token = strip_mailto(token);
    let token = bracketed(token).unwrap_or(token).trim();

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// The last `<...>` token in `value`. Doubled closing brackets end one token.
fn bracketed(value: &str) -> Option<&str> {
    let close = value.rfind('>')?;
    let end = value[..close].trim_end_matches('>').len();
    let open = value[..end].rfind('<')?;
    Some(&value[open + 1..end])
}

fn strip_mailto(value: &str) -> &str {
    match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("mailto:") => &value[7..],
        _ => value,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new("unknown@address.com", "ASSORTED")
    }

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.add(*name, *value);
        }
        headers
    }

    #[test]
    fn test_list_id_bracket_token() {
        let h = headers(&[("List-Id", "Foo discussion <foo.example.com>")]);
        assert_eq!(resolver().resolve(&h).as_str(), "foo.example.com");
    }

    #[test]
    fn test_list_id_last_bracket_token_wins() {
        let h = headers(&[("List-Id", "a <x> b <y>")]);
        assert_eq!(resolver().resolve(&h).as_str(), "y");

        let h = headers(&[("List-Id", "Dev <ignored> list <dev.example.com>")]);
        assert_eq!(resolver().resolve(&h).as_str(), "dev.example.com");
    }

    #[test]
    fn test_nested_mailto_token() {
        let h = headers(&[("List-Post", "<mailto:<dev@example.com>>")]);
        assert_eq!(resolver().posting_address(&h), "dev@example.com");
    }

    #[test]
    fn test_list_id_without_brackets() {
        let h = headers(&[("List-Id", " foo.example.com ")]);
        assert_eq!(resolver().resolve(&h).as_str(), "foo.example.com");
    }

    #[test]
    fn test_fallback_order() {
        let h = headers(&[
            ("Sender", "Owner <owner-foo@example.com>"),
            ("X-Original-To", "orig@example.com"),
            ("X-Mailing-List", "<mailto:ml@example.com>"),
        ]);
        assert_eq!(resolver().resolve(&h).as_str(), "ml@example.com");

        let h = headers(&[
            ("Sender", "Owner <owner-foo@example.com>"),
            ("X-Original-To", "mailto:orig@example.com"),
        ]);
        assert_eq!(resolver().resolve(&h).as_str(), "orig@example.com");

        let h = headers(&[("Sender", "Owner <owner-foo@example.com>")]);
        assert_eq!(resolver().resolve(&h).as_str(), "owner-foo@example.com");
    }

    #[test]
    fn test_no_list_headers_resolve_to_sentinel() {
        let h = headers(&[("From", "a@b"), ("Subject", "hi")]);
        assert_eq!(resolver().resolve(&h).as_str(), "unknown@address.com");
    }

    #[test]
    fn test_administrivia_overrides_list_id() {
        let h = headers(&[
            ("List-Id", "<foo.example.com>"),
            ("X-List-Administrivia", "yes"),
        ]);
        assert_eq!(resolver().resolve(&h).as_str(), "ASSORTED");
    }

    #[test]
    fn test_no_archive_is_case_insensitive() {
        let h = headers(&[("List-Id", "<foo.example.com>"), ("x-no-archive", "Yes")]);
        assert_eq!(resolver().resolve(&h).as_str(), "ASSORTED");

        let h = headers(&[("List-Id", "<foo.example.com>"), ("X-No-Archive", "no")]);
        assert_eq!(resolver().resolve(&h).as_str(), "foo.example.com");
    }

    #[test]
    fn test_unsafe_characters_replaced() {
        let h = headers(&[("List-Id", "<../evil/list name>")]);
        assert_eq!(resolver().resolve(&h).as_str(), "_evil_list_name");
    }

    #[test]
    fn test_only_dots_fall_back_to_sentinel() {
        let h = headers(&[("List-Id", "<..>")]);
        assert_eq!(resolver().resolve(&h).as_str(), "unknown@address.com");
    }

    #[test]
    fn test_posting_address_prefers_list_post() {
        let h = headers(&[
            ("List-Id", "<foo.example.com>"),
            ("List-Post", "<mailto:foo@example.com>"),
        ]);
        assert_eq!(resolver().posting_address(&h), "foo@example.com");
    }

    #[test]
    fn test_posting_address_falls_back_to_routing_value() {
        let h = headers(&[("List-Id", "<foo.example.com>"), ("X-No-Archive", "yes")]);
        assert_eq!(resolver().posting_address(&h), "foo.example.com");

        assert_eq!(resolver().posting_address(&Headers::new()), "unknown@address.com");
    }

    #[test]
    fn test_unusable_posting_address_replaced() {
        let h = headers(&[("List-Post", "<mailto:foo bar@example.com>")]);
        assert_eq!(resolver().posting_address(&h), "unknown@address.com");
    }

    #[test]
    fn test_is_safe() {
        assert!(ListIdentity::is_safe("ASSORTED"));
        assert!(ListIdentity::is_safe("foo.example.com"));
        assert!(!ListIdentity::is_safe(".hidden"));
        assert!(!ListIdentity::is_safe("a/b"));
        assert!(!ListIdentity::is_safe(""));
    }
}
