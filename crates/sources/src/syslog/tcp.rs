//! Syslog TCP listener
//!
//! Accepts TCP connections and decodes framed syslog messages. Each
//! connection gets its own `FrameDecoder`, so framing detection restarts
//! per frame on that connection's stream. Decoded messages are parsed
//! inline; a message that matches no grammar is logged and discarded while
//! the connection stays open. Framing violations and idle timeouts close
//! the connection.

use std::net::SocketAddr;
#[cfg(unix)]
use std::os::fd::{AsRawFd, FromRawFd};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use siphon_protocol::{FrameDecoder, parse_message};
use siphon_sinks::BatchQueue;
#[cfg(unix)]
use socket2::{Socket, TcpKeepalive};
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::syslog::SyslogSourceConfig;

/// Per-connection read buffer size
const READ_BUFFER_SIZE: usize = 8192;

/// TCP keepalive interval (30s)
#[cfg(unix)]
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Receive buffer requested via SO_RCVBUF
#[cfg(unix)]
const SOCKET_BUFFER_SIZE: usize = 256 * 1024;

/// Syslog TCP listener errors
#[derive(Debug, thiserror::Error)]
pub enum SyslogTcpSourceError {
    /// Failed to bind to address
    #[error("failed to bind TCP listener to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Listener counters, updated by connection tasks
#[derive(Debug, Default)]
pub struct SyslogTcpMetrics {
    /// Connections accepted over the listener's lifetime
    pub connections_total: AtomicU64,

    /// Messages decoded and parsed successfully
    pub messages_received: AtomicU64,

    /// Messages that matched no grammar and were discarded
    pub parse_failures: AtomicU64,
}

/// Syslog TCP listener
///
/// Parsed events are enqueued on the shared batch queue; the listener never
/// blocks on publishing.
pub struct SyslogTcpSource {
    config: SyslogSourceConfig,
    queue: Arc<BatchQueue>,
    metrics: Arc<SyslogTcpMetrics>,
}

impl SyslogTcpSource {
    /// Create a TCP listener feeding `queue`
    pub fn new(config: SyslogSourceConfig, queue: Arc<BatchQueue>) -> Self {
        Self {
            config,
            queue,
            metrics: Arc::new(SyslogTcpMetrics::default()),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<SyslogTcpMetrics> {
        &self.metrics
    }

    /// Bind and run the accept loop until cancelled
    ///
    /// Returns an error only when the listener itself fails; per-connection
    /// errors are logged and confined to that connection.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SyslogTcpSourceError> {
        let bind_addr = self.config.bind_address();

        let listener =
            TcpListener::bind(&bind_addr)
                .await
                .map_err(|e| SyslogTcpSourceError::Bind {
                    address: bind_addr.clone(),
                    source: e,
                })?;

        tracing::info!(
            address = %bind_addr,
            timeout = ?self.config.connection_timeout,
            "syslog TCP listener started"
        );

        self.accept_loop(listener, cancel).await
    }

    async fn accept_loop(
        &self,
        listener: TcpListener,
        cancel: CancellationToken,
    ) -> Result<(), SyslogTcpSourceError> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            self.metrics.connections_total.fetch_add(1, Ordering::Relaxed);
                            configure_socket(&stream);

                            tracing::debug!(peer = %peer, "syslog TCP connection accepted");

                            let queue = Arc::clone(&self.queue);
                            let metrics = Arc::clone(&self.metrics);
                            let timeout = self.config.connection_timeout;
                            tokio::spawn(async move {
                                handle_connection(stream, peer, timeout, queue, metrics).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "syslog TCP accept error");
                        }
                    }
                }
            }
        }

        tracing::info!("syslog TCP listener stopped");
        Ok(())
    }
}

/// Decode and parse messages from one connection until it closes
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    timeout: Option<Duration>,
    queue: Arc<BatchQueue>,
    metrics: Arc<SyslogTcpMetrics>,
) {
    let reader = BufReader::with_capacity(READ_BUFFER_SIZE, stream);
    let mut decoder = FrameDecoder::new(reader, peer.to_string());
    let source_ip = peer.ip().to_string();

    loop {
        let result = match timeout {
            Some(t) => match tokio::time::timeout(t, decoder.read_frame()).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!(peer = %peer, "syslog TCP connection idle, closing");
                    break;
                }
            },
            None => decoder.read_frame().await,
        };

        match result {
            Ok(Some(message)) => match parse_message(&message, &source_ip) {
                Ok(event) => {
                    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    queue.enqueue(event);
                }
                Err(e) => {
                    metrics.parse_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        peer = %peer,
                        error = %e,
                        "discarding unparseable syslog message"
                    );
                }
            },
            Ok(None) => break, // clean close or protocol violation, already logged
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "syslog TCP framing error, closing");
                break;
            }
        }
    }

    tracing::debug!(peer = %peer, "syslog TCP connection closed");
}

/// Configure socket options using socket2 (Unix only)
#[cfg(unix)]
fn configure_socket(stream: &TcpStream) {
    let fd = stream.as_raw_fd();

    // SAFETY: We're borrowing the fd temporarily. We use forget() to prevent
    // socket2 from closing the fd when it drops - tokio still owns it.
    let socket = unsafe { Socket::from_raw_fd(fd) };

    if let Err(e) = socket.set_tcp_nodelay(true) {
        tracing::warn!(error = %e, "Failed to set TCP_NODELAY");
    }

    if let Err(e) = socket.set_recv_buffer_size(SOCKET_BUFFER_SIZE) {
        tracing::warn!(error = %e, "Failed to set SO_RCVBUF");
    }

    let keepalive = TcpKeepalive::new().with_time(KEEPALIVE_INTERVAL);
    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        tracing::warn!(error = %e, "Failed to set TCP keepalive");
    }

    // Don't close the fd - tokio owns it
    std::mem::forget(socket);
}

/// Configure socket - no-op on Windows (tokio's defaults suffice)
#[cfg(not(unix))]
fn configure_socket(_stream: &TcpStream) {}

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tcp_test;
