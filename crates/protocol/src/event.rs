//! Syslog event model
//!
//! `SyslogEvent` is the immutable value produced by the parser and consumed
//! by the publisher. Facility and severity come from decomposing the wire
//! priority: `priority = facility * 8 + severity`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ParseError;

/// The 24 standard syslog facilities (RFC 3164 §4.1.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Facility {
    Kern,
    User,
    Mail,
    Daemon,
    Auth,
    Syslog,
    Lpr,
    News,
    Uucp,
    Cron,
    AuthPriv,
    Ftp,
    Ntp,
    Audit,
    Audit2,
    Cron2,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    const TABLE: [Facility; 24] = [
        Facility::Kern,
        Facility::User,
        Facility::Mail,
        Facility::Daemon,
        Facility::Auth,
        Facility::Syslog,
        Facility::Lpr,
        Facility::News,
        Facility::Uucp,
        Facility::Cron,
        Facility::AuthPriv,
        Facility::Ftp,
        Facility::Ntp,
        Facility::Audit,
        Facility::Audit2,
        Facility::Cron2,
        Facility::Local0,
        Facility::Local1,
        Facility::Local2,
        Facility::Local3,
        Facility::Local4,
        Facility::Local5,
        Facility::Local6,
        Facility::Local7,
    ];
}

/// The 8 syslog severities, Emergency (0) through Debug (7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Informational,
    Debug,
}

impl Severity {
    const TABLE: [Severity; 8] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Informational,
        Severity::Debug,
    ];
}

/// Decompose a wire priority into facility and severity
///
/// `facility = priority / 8`, `severity = priority % 8`. Values above 191
/// (facility 23, severity 7) fail structurally rather than wrapping.
pub(crate) fn decompose_priority(priority: u16) -> Result<(Facility, Severity), ParseError> {
    if priority > crate::MAX_PRIORITY {
        return Err(ParseError::PriorityOutOfRange { priority });
    }

    let facility = Facility::TABLE[(priority / 8) as usize];
    let severity = Severity::TABLE[(priority % 8) as usize];
    Ok((facility, severity))
}

/// A parsed syslog message
///
/// Immutable once constructed. `source_ip` is the observed network peer,
/// never anything claimed in the payload; `host` is whatever the sender
/// put in the hostname field (empty when the grammar had none).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyslogEvent {
    /// Facility decoded from the priority tag
    pub facility: Facility,

    /// Severity decoded from the priority tag
    pub severity: Severity,

    /// Message timestamp; receive time when the grammar supplies none
    pub timestamp: DateTime<Utc>,

    /// Sender-claimed hostname (empty when absent)
    pub host: String,

    /// Message body after the header fields
    pub content: String,

    /// Observed peer address of the connection or datagram
    pub source_ip: String,
}

impl SyslogEvent {
    /// Serialize to the newline-terminated JSON record format sent to the sink
    pub fn to_record_bytes(&self) -> Vec<u8> {
        // Serialize can't fail: no maps with non-string keys, no non-finite floats
        let mut bytes = serde_json::to_vec(self).unwrap_or_default();
        bytes.push(b'\n');
        bytes
    }
}
