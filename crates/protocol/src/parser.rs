//! Message grammar matching
//!
//! A decoded frame is classified against an ordered list of grammars, first
//! match wins:
//!
//! 1. RFC 3164 (BSD syslog): `<PRI>MMM dd HH:MM:SS HOSTNAME CONTENT`
//! 2. RFC 5424 (IETF syslog): `<PRI>VERSION TIMESTAMP HOSTNAME CONTENT`,
//!    with `-` placeholders allowed for timestamp and hostname
//! 3. CEF / unstructured fallback: any message carrying a leading `<PRI>`
//!    tag; everything after the closing `>` becomes the content verbatim
//!
//! A message with no leading priority tag matches nothing and fails with
//! `ParseError::Malformed` - the caller drops it and keeps the connection.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use regex::Regex;

use crate::event::{decompose_priority, SyslogEvent};
use crate::ParseError;

static RFC3164: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(<\d{1,3}>)([A-Z][a-z][a-z]\s{1,2}\d{1,2}\s\d{2}:\d{2}:\d{2})\s([A-Za-z][A-Za-z0-9._@-]*)\s(.*)$",
    )
    .unwrap()
});

static RFC5424: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(<\d{1,3}>)\d\s(?:(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d{1,6})?(?:[+-]\d{2}:\d{2}|Z)?)|-)\s(?:([A-Za-z][A-Za-z0-9._@-]*)|-)\s(.*)$",
    )
    .unwrap()
});

/// Parse a raw message into a `SyslogEvent`
///
/// `source_ip` is the observed peer address supplied by the caller; it is
/// attached verbatim and never derived from the payload.
pub fn parse_message(raw: &str, source_ip: &str) -> Result<SyslogEvent, ParseError> {
    if let Some(caps) = RFC3164.captures(raw) {
        let (facility, severity) = priority_from_tag(&caps[1])?;
        return Ok(SyslogEvent {
            facility,
            severity,
            timestamp: parse_rfc3164_timestamp(&caps[2]),
            host: caps[3].to_string(),
            content: caps[4].to_string(),
            source_ip: source_ip.to_string(),
        });
    }

    if let Some(caps) = RFC5424.captures(raw) {
        let (facility, severity) = priority_from_tag(&caps[1])?;
        let timestamp = caps
            .get(2)
            .map(|m| parse_rfc5424_timestamp(m.as_str()))
            .unwrap_or_else(Utc::now);
        return Ok(SyslogEvent {
            facility,
            severity,
            timestamp,
            host: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
            content: caps[4].to_string(),
            source_ip: source_ip.to_string(),
        });
    }

    parse_fallback(raw, source_ip)
}

/// CEF / unstructured fallback: a leading `<PRI>` tag followed by anything
///
/// The remainder after the closing `>` is the content with no further
/// decomposition. No tag at all is a structural failure, never a default.
fn parse_fallback(raw: &str, source_ip: &str) -> Result<SyslogEvent, ParseError> {
    let rest = raw
        .strip_prefix('<')
        .ok_or_else(|| ParseError::malformed(raw))?;
    let close = rest.find('>').ok_or_else(|| ParseError::malformed(raw))?;
    let digits = &rest[..close];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || digits.len() > 3 {
        return Err(ParseError::malformed(raw));
    }

    let (facility, severity) = priority_from_tag(&raw[..close + 2])?;
    Ok(SyslogEvent {
        facility,
        severity,
        timestamp: Utc::now(),
        host: String::new(),
        content: rest[close + 1..].to_string(),
        source_ip: source_ip.to_string(),
    })
}

/// Decompose a `<PRI>` tag (angle brackets included) into facility/severity
fn priority_from_tag(tag: &str) -> Result<(crate::Facility, crate::Severity), ParseError> {
    // The grammars guarantee <1-3 digits>, so the parse itself can't fail;
    // only the range check can.
    let priority: u16 = tag[1..tag.len() - 1].parse().unwrap_or(u16::MAX);
    decompose_priority(priority)
}

/// Parse a BSD-style timestamp (`MMM d HH:mm:ss`)
///
/// RFC 3164 timestamps carry no year; the current year at parse time is
/// assumed, and the value is taken as UTC-naive. Single-digit days arrive
/// space-padded, so whitespace is collapsed before parsing.
fn parse_rfc3164_timestamp(ts: &str) -> DateTime<Utc> {
    let normalized: Vec<&str> = ts.split_whitespace().collect();
    let with_year = format!("{} {}", Utc::now().year(), normalized.join(" "));

    NaiveDateTime::parse_from_str(&with_year, "%Y %b %d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse an ISO-8601 timestamp with optional fraction and offset/Z suffix
fn parse_rfc5424_timestamp(ts: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return dt.with_timezone(&Utc);
    }

    // No zone suffix: the grammar allows a bare local timestamp; take it as UTC
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}
