//! Syslog listeners
//!
//! One TCP and one UDP receiver, bound to the same port by default. TCP
//! carries framed streams (octet counting or non-transparent framing,
//! detected per frame); UDP carries one message per datagram. Both parse
//! inline and enqueue parsed events; raw bytes never cross the listener
//! boundary.

pub mod tcp;
pub mod udp;

use std::time::Duration;

pub use tcp::{SyslogTcpSource, SyslogTcpSourceError};
pub use udp::{SyslogUdpSource, SyslogUdpSourceError};

/// Default syslog port (privileged - may need root)
const DEFAULT_PORT: u16 = 514;

/// Default TCP idle timeout (15 minutes)
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(900);

/// Shared listener configuration
///
/// The TCP and UDP listeners bind the same address and port;
/// `connection_timeout` applies to TCP connections only.
#[derive(Debug, Clone)]
pub struct SyslogSourceConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub address: String,

    /// Listen port
    pub port: u16,

    /// TCP idle timeout; `None` disables it
    pub connection_timeout: Option<Duration>,
}

impl Default for SyslogSourceConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            connection_timeout: Some(DEFAULT_CONNECTION_TIMEOUT),
        }
    }
}

impl SyslogSourceConfig {
    /// Create config with custom port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
