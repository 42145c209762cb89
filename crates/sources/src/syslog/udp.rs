//! Syslog UDP listener
//!
//! One datagram is one message: no framing layer, no connection state. A
//! trailing LF or CRLF is trimmed (some clients append one), the rest is
//! parsed and enqueued. Datagrams that match no grammar are logged and
//! dropped; the socket keeps receiving.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use siphon_protocol::parse_message;
use siphon_sinks::BatchQueue;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::syslog::SyslogSourceConfig;

/// Maximum datagram size we read; longer datagrams are truncated by the OS
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Receive buffer requested via SO_RCVBUF, to absorb bursts
const SOCKET_BUFFER_SIZE: usize = 256 * 1024;

/// Syslog UDP listener errors
#[derive(Debug, thiserror::Error)]
pub enum SyslogUdpSourceError {
    /// Failed to bind to address
    #[error("failed to bind UDP socket to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Listener counters
#[derive(Debug, Default)]
pub struct SyslogUdpMetrics {
    /// Datagrams received
    pub packets_received: AtomicU64,

    /// Messages parsed successfully
    pub messages_received: AtomicU64,

    /// Datagrams that matched no grammar and were dropped
    pub parse_failures: AtomicU64,
}

/// Syslog UDP listener
pub struct SyslogUdpSource {
    config: SyslogSourceConfig,
    queue: Arc<BatchQueue>,
    metrics: Arc<SyslogUdpMetrics>,
}

impl SyslogUdpSource {
    /// Create a UDP listener feeding `queue`
    pub fn new(config: SyslogSourceConfig, queue: Arc<BatchQueue>) -> Self {
        Self {
            config,
            queue,
            metrics: Arc::new(SyslogUdpMetrics::default()),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<SyslogUdpMetrics> {
        &self.metrics
    }

    /// Bind and run the receive loop until cancelled
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SyslogUdpSourceError> {
        let bind_addr = self.config.bind_address();
        let socket_addr: SocketAddr =
            bind_addr.parse().map_err(|_| SyslogUdpSourceError::Bind {
                address: bind_addr.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "invalid socket address",
                ),
            })?;

        let socket = create_socket(socket_addr).map_err(|e| SyslogUdpSourceError::Bind {
            address: bind_addr.clone(),
            source: e,
        })?;

        tracing::info!(address = %bind_addr, "syslog UDP listener started");

        let mut recv_buf = vec![0u8; MAX_DATAGRAM_SIZE];

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                recv_result = socket.recv_from(&mut recv_buf) => {
                    match recv_result {
                        Ok((len, peer)) => {
                            self.metrics.packets_received.fetch_add(1, Ordering::Relaxed);
                            self.process_datagram(&recv_buf[..len], peer);
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "syslog UDP recv error");
                        }
                    }
                }
            }
        }

        tracing::info!("syslog UDP listener stopped");
        Ok(())
    }

    /// Parse one datagram and enqueue the event
    fn process_datagram(&self, data: &[u8], peer: SocketAddr) {
        let message = trim_trailing_newline(data);
        if message.is_empty() {
            return;
        }

        let text = String::from_utf8_lossy(message);
        match parse_message(&text, &peer.ip().to_string()) {
            Ok(event) => {
                self.metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                self.queue.enqueue(event);
            }
            Err(e) => {
                self.metrics.parse_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    peer = %peer,
                    error = %e,
                    "discarding unparseable syslog datagram"
                );
            }
        }
    }
}

/// Create the UDP socket with a larger receive buffer
fn create_socket(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;

    if let Err(e) = socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE) {
        tracing::warn!(
            error = %e,
            requested_size = SOCKET_BUFFER_SIZE,
            "Failed to set UDP SO_RCVBUF"
        );
    }

    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket)
}

/// Trim a trailing newline (LF or CRLF)
#[inline]
pub fn trim_trailing_newline(data: &[u8]) -> &[u8] {
    let mut end = data.len();

    if end > 0 && data[end - 1] == b'\n' {
        end -= 1;
        if end > 0 && data[end - 1] == b'\r' {
            end -= 1;
        }
    }

    &data[..end]
}

#[cfg(test)]
#[path = "udp_test.rs"]
mod udp_test;
