//! Siphon Protocol - syslog wire framing and message grammars
//!
//! This crate provides the types that turn raw bytes from the network into
//! structured syslog events:
//! - `StreamBuffer` - growing byte window over a live TCP stream
//! - `FrameDecoder` - per-connection TCP framing detection and decoding
//!   (octet counting, non-transparent framing, raw NUL)
//! - `MessageParser` - ordered grammar matching (RFC 3164, RFC 5424, CEF
//!   fallback) producing `SyslogEvent`s
//! - `SyslogEvent` - immutable parsed event with facility/severity
//!
//! # Design Principles
//!
//! - **Framing is per-connection**: one `FrameDecoder` per TCP stream, one
//!   decoded message per call
//! - **Grammars are ordered**: matchers are tried in sequence; the last entry
//!   is a catch-all for tagged-but-unstructured payloads, untagged input
//!   fails with `ParseError`
//! - **The peer address is authoritative**: `source_ip` always comes from the
//!   socket, never from the payload

mod error;
mod event;
mod framing;
mod parser;
mod stream;

pub use error::{FramingError, ParseError};
pub use event::{Facility, Severity, SyslogEvent};
pub use framing::FrameDecoder;
pub use parser::parse_message;
pub use stream::StreamBuffer;

/// Maximum valid syslog priority: facility 23 * 8 + severity 7
pub const MAX_PRIORITY: u16 = 191;

// Test modules - only compiled during testing
#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;
#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;
