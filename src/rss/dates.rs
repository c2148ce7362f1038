//! Publish-date normalization for the formats seen across real feeds.
//!
//! This is the single place new feed-date quirks get handled.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateParseError {
    #[error("pubDate field is empty")]
    Empty,
    #[error("unsupported date format: {0}")]
    Unrecognized(String),
}

/// Parse a feed publish date into a UTC instant.
///
/// Formats are tried in a fixed order and the first match wins: RFC 1123 with
/// a numeric zone, RFC 2822 (covers name zones like "GMT"), a bare
/// `YYYY-MM-DDThh:mm:ssZ` pattern, then RFC 3339.
pub fn parse_published(raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    if raw.is_empty() {
        return Err(DateParseError::Empty);
    }

    if let Ok(parsed) = DateTime::parse_from_str(raw, "%a, %d %b %Y %H:%M:%S %z") {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(parsed.and_utc());
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    Err(DateParseError::Unrecognized(raw.to_string()))
}
