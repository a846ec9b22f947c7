//! `Date` header parsing.
//!
//! Real-world `Date` headers are frequently malformed, so parsing is an
//! ordered list of attempts: strict RFC 2822 first, then a permissive pass
//! over common free-text layouts, then the Unix epoch.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Which attempt produced a [`MessageDate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    /// Parsed as RFC 2822.
    Strict,
    /// Parsed by the permissive fallback.
    Permissive,
    /// Header absent or unparseable; the epoch was substituted.
    Epoch,
}

/// A parsed message date with its original UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDate {
    /// The instant, carrying the offset written in the header (UTC if none).
    pub datetime: DateTime<FixedOffset>,
    /// How the value was obtained.
    pub source: DateSource,
}

impl MessageDate {
    /// The Unix epoch in UTC.
    #[must_use]
    pub fn epoch() -> Self {
        Self {
            datetime: DateTime::<Utc>::default().fixed_offset(),
            source: DateSource::Epoch,
        }
    }

    /// Seconds since the Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.datetime.timestamp()
    }

    /// Offset from UTC in minutes, negative west of Greenwich.
    #[must_use]
    pub fn offset_minutes(&self) -> i32 {
        self.datetime.offset().local_minus_utc() / 60
    }

    /// Returns `true` if the epoch was substituted.
    #[must_use]
    pub fn is_defaulted(&self) -> bool {
        self.source == DateSource::Epoch
    }
}

type DateParser = fn(&str) -> Option<DateTime<FixedOffset>>;

const DATE_PARSERS: &[(DateSource, DateParser)] = &[
    (DateSource::Strict, parse_strict),
    (DateSource::Permissive, parse_permissive),
];

/// Layouts carrying a numeric offset, tried after normalisation.
const ZONED_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%a %b %d %H:%M:%S %Y %z",
    "%a, %d %b %y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
];

/// Layouts without an offset; the value is taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%a %b %d %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%a, %d %b %Y"];

/// Zone names that appear in place of a numeric offset.
const ZONE_NAMES: &[(&str, &str)] = &[
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("GMT", "+0000"),
    ("Z", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
];

/// Parses a `Date` header value, never failing.
///
/// A missing header yields the epoch. Values without zone information are
/// interpreted as UTC.
#[must_use]
pub fn parse_date(value: Option<&str>) -> MessageDate {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| {
            DATE_PARSERS.iter().find_map(|(source, parser)| {
                parser(v).map(|datetime| MessageDate {
                    datetime,
                    source: *source,
                })
            })
        })
        .unwrap_or_else(MessageDate::epoch)
}

fn parse_strict(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value).ok()
}

fn parse_permissive(value: &str) -> Option<DateTime<FixedOffset>> {
    let normalized = normalize(value);
    let text = normalized.as_str();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime);
    }

    ZONED_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|naive| naive.and_utc().fixed_offset())
        })
        .or_else(|| {
            NAIVE_DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc().fixed_offset())
        })
}

/// Strips comments, collapses whitespace and rewrites zone names.
fn normalize(value: &str) -> String {
    let mut without_comments = String::with_capacity(value.len());
    let mut depth = 0usize;
    for ch in value.chars() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => without_comments.push(ch),
            _ => {}
        }
    }

    let spaced = without_comments.replace(',', ", ");
    let mut tokens: Vec<&str> = spaced.split_whitespace().collect();

    // A zone name trailing a numeric offset ("+0200 CEST") is redundant.
    if tokens.len() >= 2 {
        let last = tokens[tokens.len() - 1];
        let before = tokens[tokens.len() - 2];
        if is_numeric_offset(before) && last.chars().all(|c| c.is_ascii_alphabetic()) {
            tokens.pop();
        }
    }

    if let Some(last) = tokens.last_mut()
        && let Some((_, offset)) = ZONE_NAMES
            .iter()
            .find(|(name, _)| last.eq_ignore_ascii_case(name))
    {
        *last = *offset;
    }

    tokens.join(" ")
}

fn is_numeric_offset(token: &str) -> bool {
    token.len() == 5
        && (token.starts_with('+') || token.starts_with('-'))
        && token[1..].chars().all(|c| c.is_ascii_digit())
}
