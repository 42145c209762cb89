//! Siphon Sources - network listeners feeding the batch queue
//!
//! Both listeners share the same downstream contract: decode bytes into
//! logical syslog messages, parse them into `SyslogEvent`s with the peer's
//! socket address as the source IP, and enqueue them on the shared
//! `BatchQueue`. Unparseable messages are logged and discarded without
//! disturbing the connection or the socket.

pub mod syslog;

pub use syslog::{SyslogSourceConfig, SyslogTcpSource, SyslogUdpSource};
