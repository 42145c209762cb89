//! Siphon - syslog ingestion daemon
//!
//! Listens for syslog on TCP and UDP (same port), parses RFC 3164,
//! RFC 5424 and CEF-tagged messages, and forwards them to the configured
//! record sink in size- and time-triggered batches.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (port 514, stdout sink) - stream name comes from config or env
//! SIPHON_STREAM_NAME=syslog-events siphon
//!
//! # Explicit config file
//! siphon --config /etc/siphon.toml
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use siphon_config::{Config, LogConfig, LogFormat, LogLevel, StreamKind};
use siphon_sinks::{
    BatchQueue, NullSink, Publisher, PublisherConfig, RecordSink, StdoutSink,
};
use siphon_sources::{SyslogSourceConfig, SyslogTcpSource, SyslogUdpSource};

/// Config files tried when no --config is given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["siphon.toml", "configs/siphon.toml"];

/// Grace period for tasks to finish after cancellation
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Siphon - syslog ingestion daemon
#[derive(Parser, Debug)]
#[command(name = "siphon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (error if specified but not found)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    config.apply_env_overrides()?;
    if let Some(level) = &cli.log_level {
        config.log.level =
            LogLevel::parse(level).ok_or_else(|| anyhow!("unknown log level '{}'", level))?;
    }
    config.validate()?;

    init_logging(&config.log)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        stream = %config.stream.name,
        "siphon starting"
    );

    if let Some(profile) = &config.stream.profile {
        info!(profile = %profile, "using credentials profile");
        // SAFETY: runs at startup, before anything reads the environment
        unsafe { std::env::set_var("AWS_PROFILE", profile) };
    }

    let result = run_server(config).await;
    if let Err(ref e) = result {
        error!(error = %e, "server error");
    } else {
        info!("siphon shutdown complete");
    }
    result
}

/// Load configuration from the given path, the default paths, or defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
        return Config::from_file(path).context("failed to load configuration");
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let candidate = Path::new(candidate);
        if candidate.exists() {
            return Config::from_file(candidate).context("failed to load configuration");
        }
    }

    Ok(Config::default())
}

/// Initialize the tracing subscriber
fn init_logging(log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(log.level.as_str())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Console => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }

    Ok(())
}

/// Why the run loop unblocked
enum Exit {
    Signal,
    Tcp(ListenerResult),
    Udp(ListenerResult),
}

type ListenerResult = std::result::Result<Result<()>, tokio::task::JoinError>;

/// Wire up the pipeline and run until a shutdown signal or listener failure
///
/// Both listeners must stay up: if either terminates for any reason the
/// process shuts down and exits non-zero. Partial listening would silently
/// drop one transport's traffic.
async fn run_server(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();

    // Queue and flush timer
    let (batch_tx, batch_rx) = mpsc::unbounded_channel();
    let queue = Arc::new(BatchQueue::new(config.publish.size_trigger, batch_tx));
    let timer_task = queue.spawn_timer(config.publish.interval(), cancel.clone());

    // Sink and publisher
    let sink: Arc<dyn RecordSink> = match config.stream.kind {
        StreamKind::Stdout => Arc::new(StdoutSink::new(config.stream.name.clone())),
        StreamKind::Null => Arc::new(NullSink::new()),
    };
    let publisher = Publisher::new(
        sink,
        PublisherConfig {
            retry_attempts: config.publish.retry_attempts,
            backoff_base: Duration::from_millis(config.publish.backoff_base_ms),
            max_chunk_records: config.publish.max_chunk_records,
            max_chunk_bytes: config.publish.max_chunk_bytes,
            ..PublisherConfig::default()
        },
    );
    let publisher_task = tokio::spawn(publisher.run(batch_rx));

    // Listeners
    let source_config = SyslogSourceConfig {
        address: config.server.address.clone(),
        port: config.server.port,
        connection_timeout: config.server.connection_timeout(),
    };

    let tcp = SyslogTcpSource::new(source_config.clone(), Arc::clone(&queue));
    let tcp_cancel = cancel.clone();
    let mut tcp_task: JoinHandle<Result<()>> =
        tokio::spawn(async move { tcp.run(tcp_cancel).await.map_err(anyhow::Error::from) });

    let udp = SyslogUdpSource::new(source_config, Arc::clone(&queue));
    let udp_cancel = cancel.clone();
    let mut udp_task: JoinHandle<Result<()>> =
        tokio::spawn(async move { udp.run(udp_cancel).await.map_err(anyhow::Error::from) });

    info!(
        address = %config.server.bind_address(),
        size_trigger = config.publish.size_trigger,
        interval_ms = config.publish.interval_ms,
        "siphon running"
    );

    let exit = tokio::select! {
        _ = wait_for_shutdown() => Exit::Signal,
        result = &mut tcp_task => Exit::Tcp(result),
        result = &mut udp_task => Exit::Udp(result),
    };

    cancel.cancel();

    let failure = match exit {
        Exit::Signal => {
            info!("shutdown signal received, stopping...");
            drain_task("TCP listener", tcp_task).await;
            drain_task("UDP listener", udp_task).await;
            None
        }
        Exit::Tcp(result) => {
            drain_task("UDP listener", udp_task).await;
            Some(listener_error("TCP", result))
        }
        Exit::Udp(result) => {
            drain_task("TCP listener", tcp_task).await;
            Some(listener_error("UDP", result))
        }
    };

    // The timer's final flush runs on cancellation; dropping our queue
    // handle afterwards closes the channel so the publisher can drain out
    drain_task("flush timer", timer_task).await;
    drop(queue);
    drain_task("publisher", publisher_task).await;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Turn a listener task outcome into the fatal error it represents
fn listener_error(name: &str, result: ListenerResult) -> anyhow::Error {
    match result {
        Ok(Ok(())) => anyhow!("{} listener exited unexpectedly", name),
        Ok(Err(e)) => e.context(format!("{} listener failed", name)),
        Err(e) => anyhow!("{} listener panicked: {}", name, e),
    }
}

/// Await a task through the shutdown grace period
async fn drain_task<T>(name: &str, task: JoinHandle<T>) {
    match tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(task = name, error = %e, "task panicked during shutdown"),
        Err(_) => warn!(task = name, "task did not finish within timeout"),
    }
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
