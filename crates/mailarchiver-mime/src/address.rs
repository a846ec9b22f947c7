//! Address header parsing.

/// A display name and address pair taken from an address header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mailbox {
    /// Display name, unquoted. Empty when the header carries none.
    pub name: String,
    /// Address as written, without angle brackets. Not validated.
    pub email: String,
}

/// Splits an address header value into display name and address.
///
/// Recognised forms, tried in order:
///
/// 1. `Name <addr>` and `"Quoted Name" <addr>` (the last `<...>` pair wins,
///    so a display name may itself contain a bracketed address)
/// 2. `addr (Comment Name)`
/// 3. bare `addr`
///
/// This never fails; garbage in yields garbage out, to be sanitized by the
/// caller.
#[must_use]
pub fn parse_address(value: &str) -> Mailbox {
    let value = value.trim();

    if let Some(close) = value.rfind('>')
        && let Some(open) = value[..close].rfind('<')
    {
        return Mailbox {
            name: unquote(value[..open].trim()),
            email: value[open + 1..close].trim().to_string(),
        };
    }

    if let Some(open) = value.find('(')
        && let Some(close) = value.rfind(')')
        && close > open
    {
        return Mailbox {
            name: unquote(value[open + 1..close].trim()),
            email: value[..open].trim().to_string(),
        };
    }

    Mailbox {
        name: String::new(),
        email: value.to_string(),
    }
}

/// Removes one level of surrounding double quotes and backslash escapes.
fn unquote(name: &str) -> String {
    let Some(inner) = name
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return name.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                result.push(escaped);
            }
        } else {
            result.push(ch);
        }
    }
    result
}
