//! Protocol error types
//!
//! Errors that can occur while framing a TCP stream or parsing a message.

use thiserror::Error;

/// Errors that can occur while decoding frames from a TCP stream
#[derive(Debug, Error)]
pub enum FramingError {
    /// I/O error reading from the underlying stream
    #[error("stream read error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the connection in the middle of a frame
    #[error("unexpected EOF: peer closed mid-frame after {buffered} bytes")]
    UnexpectedEof { buffered: usize },
}

/// Errors that can occur while parsing a decoded message
#[derive(Debug, Error)]
pub enum ParseError {
    /// Message matches no supported grammar (no leading priority tag)
    #[error("message does not match RFC 3164, RFC 5424 or CEF formats: {raw}")]
    Malformed {
        /// The raw message text, kept for diagnostics
        raw: String,
    },

    /// Priority value outside the valid facility/severity range
    #[error("priority {priority} out of range (max {max})", max = crate::MAX_PRIORITY)]
    PriorityOutOfRange { priority: u16 },
}

impl ParseError {
    /// Create a malformed-message error carrying the raw text
    #[inline]
    pub fn malformed(raw: impl Into<String>) -> Self {
        Self::Malformed { raw: raw.into() }
    }
}
