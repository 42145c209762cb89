//! TCP frame decoding
//!
//! A syslog TCP connection may use one of three incompatible framings:
//!
//! - **Octet counting** (RFC 6587 §3.4.1): `<decimal-length><SP><message>`
//! - **Non-transparent framing** (RFC 6587 §3.4.2): message terminated by
//!   LF, CRLF or NUL, always starting with the `<` of the priority tag
//! - **Raw NUL**: a bare NUL byte, treated as a clean idle/close
//!
//! The format is sniffed from the first byte of every frame. Re-sniffing per
//! frame (rather than caching the mode per connection) means a sender could
//! in principle switch framing mid-stream; that matches the upstream
//! behavior this decoder replaces.

use tokio::io::AsyncRead;

use crate::stream::StreamBuffer;
use crate::FramingError;

const SP: u8 = 0x20;
const LF: u8 = 0x0A;
const CR: u8 = 0x0D;
const NUL: u8 = 0x00;

/// Decodes one logical syslog message per call from a TCP stream
///
/// Stateless across calls apart from the stream's read position: each call
/// starts a fresh detection cycle on the next unread byte.
pub struct FrameDecoder<R> {
    stream: R,
    peer: String,
}

impl<R: AsyncRead + Unpin> FrameDecoder<R> {
    /// Create a decoder over a connection's read half
    ///
    /// `peer` is used only for log context.
    pub fn new(stream: R, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }

    /// Decode the next frame
    ///
    /// Returns `Ok(Some(message))` for a decoded frame, `Ok(None)` when there
    /// are no more frames for this connection: clean close, raw NUL, an
    /// invalid leading byte (logged as a protocol violation) or a zero
    /// octet-count length. The caller closes the connection on `None`.
    pub async fn read_frame(&mut self) -> Result<Option<String>, FramingError> {
        let mut buffer = StreamBuffer::new(&mut self.stream);

        let first = match buffer.try_byte_at(0).await? {
            Some(b) => b,
            None => return Ok(None), // clean close
        };

        if first.is_ascii_digit() && first != b'0' {
            return Self::read_octet_counted(&self.peer, buffer).await;
        }

        if first == b'<' {
            return Self::read_non_transparent(buffer).await.map(Some);
        }

        if first == NUL {
            // Raw NUL: peer signalling idle/close, not a protocol violation
            tracing::debug!(peer = %self.peer, "NUL byte received, treating as close");
            return Ok(None);
        }

        tracing::warn!(
            peer = %self.peer,
            first_byte = first,
            "unrecognized TCP framing byte, closing connection"
        );
        Ok(None)
    }

    /// Octet counting: `<decimal-length><SP><message-bytes>`
    async fn read_octet_counted(
        peer: &str,
        mut buffer: StreamBuffer<'_, R>,
    ) -> Result<Option<String>, FramingError> {
        buffer.read_until_delimiter(&[SP]).await?;

        let header_len = buffer.len();
        let length = parse_octet_count(&buffer.bytes()[..header_len - 1]);
        if length == 0 {
            tracing::warn!(
                peer = %peer,
                header = %String::from_utf8_lossy(buffer.bytes()),
                "invalid octet-count header, closing connection"
            );
            return Ok(None);
        }

        buffer.read_exact_more(length as usize).await?;
        let message = &buffer.bytes()[header_len..];
        Ok(Some(decode_text(message)))
    }

    /// Non-transparent framing: read until LF or NUL, strip CRLF or the
    /// single terminator byte
    async fn read_non_transparent(
        mut buffer: StreamBuffer<'_, R>,
    ) -> Result<String, FramingError> {
        buffer.read_until_delimiter(&[LF, NUL]).await?;

        let bytes = buffer.bytes();
        let trim = if bytes.len() >= 2 && bytes[bytes.len() - 2] == CR && bytes[bytes.len() - 1] == LF
        {
            2
        } else {
            1
        };
        Ok(decode_text(&bytes[..bytes.len() - trim]))
    }
}

/// Parse the decimal length header of an octet-counted frame
///
/// Lengths are limited to the positive signed 16-bit range (max 32767);
/// non-numeric or oversized headers parse as 0, which the caller treats as
/// an invalid frame.
fn parse_octet_count(header: &[u8]) -> u16 {
    std::str::from_utf8(header)
        .ok()
        .and_then(|s| s.parse::<i16>().ok())
        .map(|n| n.max(0) as u16)
        .unwrap_or(0)
}

/// Decode message bytes as text (ASCII on the wire, lossy for stray bytes)
fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
