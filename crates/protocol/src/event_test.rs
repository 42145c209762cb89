//! Tests for the syslog event model

use chrono::{TimeZone, Utc};

use crate::event::decompose_priority;
use crate::{Facility, ParseError, Severity, SyslogEvent};

#[test]
fn test_priority_decomposition_known_values() {
    // priority = facility * 8 + severity
    for (priority, facility, severity) in [
        (0, Facility::Kern, Severity::Emergency),
        (34, Facility::Auth, Severity::Critical),
        (46, Facility::Syslog, Severity::Informational),
        (133, Facility::Local0, Severity::Notice),
        (165, Facility::Local4, Severity::Notice),
        (191, Facility::Local7, Severity::Debug),
    ] {
        let (f, s) = decompose_priority(priority).unwrap();
        assert_eq!(f, facility, "facility for priority {}", priority);
        assert_eq!(s, severity, "severity for priority {}", priority);
    }
}

#[test]
fn test_priority_round_trip() {
    for priority in 0..=191u16 {
        let (f, s) = decompose_priority(priority).unwrap();
        assert_eq!(f as u16 * 8 + s as u16, priority);
    }
}

#[test]
fn test_priority_out_of_range() {
    for priority in [192u16, 200, 999, u16::MAX] {
        match decompose_priority(priority) {
            Err(ParseError::PriorityOutOfRange { priority: p }) => assert_eq!(p, priority),
            other => panic!("expected out-of-range error, got {:?}", other),
        }
    }
}

#[test]
fn test_record_bytes_json_shape() {
    let event = SyslogEvent {
        facility: Facility::Auth,
        severity: Severity::Critical,
        timestamp: Utc.with_ymd_and_hms(2003, 10, 11, 22, 14, 15).unwrap(),
        host: "testhost".into(),
        content: "smtp: failed to send email".into(),
        source_ip: "10.0.0.1".into(),
    };

    let bytes = event.to_record_bytes();
    assert_eq!(*bytes.last().unwrap(), b'\n');

    let json: serde_json::Value = serde_json::from_slice(&bytes[..bytes.len() - 1]).unwrap();
    assert_eq!(json["facility"], "Auth");
    assert_eq!(json["severity"], "Critical");
    assert_eq!(json["host"], "testhost");
    assert_eq!(json["content"], "smtp: failed to send email");
    assert_eq!(json["source_ip"], "10.0.0.1");
}
