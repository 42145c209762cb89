//! Stream buffer
//!
//! A growing byte window over a live network stream. Framing logic needs
//! random access to bytes it has already seen (the octet-count header is
//! reinterpreted after the fact) plus on-demand extension, which a plain
//! buffered reader does not give us.
//!
//! All methods perform network I/O and may suspend indefinitely if the peer
//! goes quiet; timeouts are the connection handler's responsibility.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::FramingError;

/// Growing byte window over a live stream
///
/// Bytes are only ever appended; previously read bytes stay addressable for
/// the lifetime of the buffer. One buffer holds exactly one frame.
pub struct StreamBuffer<'a, R> {
    stream: &'a mut R,
    buf: Vec<u8>,
}

impl<'a, R: AsyncRead + Unpin> StreamBuffer<'a, R> {
    /// Create a buffer over the given stream
    pub fn new(stream: &'a mut R) -> Self {
        Self {
            stream,
            buf: Vec::with_capacity(128),
        }
    }

    /// Number of bytes read so far
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether any bytes have been read yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// All bytes read so far
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Get the byte at offset `i`, reading more from the stream if needed
    pub async fn byte_at(&mut self, i: usize) -> Result<u8, FramingError> {
        if self.buf.len() < i + 1 {
            self.read_exact_more(i + 1 - self.buf.len()).await?;
        }
        Ok(self.buf[i])
    }

    /// Get the byte at offset `i`, or `None` if the stream ends before it
    ///
    /// Used for the first byte of a frame, where EOF is a clean close rather
    /// than a truncated frame.
    pub async fn try_byte_at(&mut self, i: usize) -> Result<Option<u8>, FramingError> {
        while self.buf.len() < i + 1 {
            let needed = i + 1 - self.buf.len();
            if self.fill_at_most(needed).await? == 0 {
                return Ok(None);
            }
        }
        Ok(Some(self.buf[i]))
    }

    /// Extend the buffer until the last byte read is in `delimiters`
    ///
    /// Reads one byte at a time so the buffer never consumes past the end of
    /// the frame. No upper bound is enforced here; an unbounded
    /// delimiter-free stream is a trust boundary with the sender.
    pub async fn read_until_delimiter(&mut self, delimiters: &[u8]) -> Result<(), FramingError> {
        loop {
            if let Some(&last) = self.buf.last()
                && delimiters.contains(&last)
            {
                return Ok(());
            }
            self.read_exact_more(1).await?;
        }
    }

    /// Extend the buffer by exactly `n` additional bytes
    ///
    /// Never reads past the requested count, so bytes belonging to the next
    /// frame stay in the stream.
    pub async fn read_exact_more(&mut self, n: usize) -> Result<(), FramingError> {
        let target = self.buf.len() + n;
        while self.buf.len() < target {
            let needed = target - self.buf.len();
            if self.fill_at_most(needed).await? == 0 {
                return Err(FramingError::UnexpectedEof {
                    buffered: self.buf.len(),
                });
            }
        }
        Ok(())
    }

    /// One read of at most `max` bytes; returns the number of bytes added
    async fn fill_at_most(&mut self, max: usize) -> Result<usize, FramingError> {
        let mut chunk = [0u8; 512];
        let cap = max.min(chunk.len());
        let n = self.stream.read(&mut chunk[..cap]).await?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}
