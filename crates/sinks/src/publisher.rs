//! Batch publisher
//!
//! Drains flushed batches from the queue channel and delivers them to the
//! sink. A batch is split into chunks respecting the sink's per-request
//! limits (record count and cumulative bytes); chunks are sent concurrently
//! and each runs its own retry sequence. Partial failures are retried with
//! exponential backoff plus jitter, resubmitting only the records the sink
//! has not yet accepted. Exhausted retries and transport errors are logged
//! and dropped - delivery is best-effort.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use siphon_protocol::SyslogEvent;
use tokio::sync::mpsc;

use crate::queue::Batch;
use crate::sink::{RecordSink, SinkRecord};

/// Delivery tuning
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Additional attempts after the first send
    pub retry_attempts: u32,

    /// Base backoff unit; retry n waits `2^n * base` plus jitter
    pub backoff_base: Duration,

    /// Upper bound (exclusive) of the random jitter added to each backoff
    pub jitter_max: Duration,

    /// Maximum records per sink request
    pub max_chunk_records: usize,

    /// Maximum cumulative serialized bytes per sink request
    pub max_chunk_bytes: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 4,
            backoff_base: Duration::from_millis(150),
            jitter_max: Duration::from_millis(100),
            max_chunk_records: 500,
            max_chunk_bytes: 4 * 1024 * 1024,
        }
    }
}

/// One serialized event within a publish-with-retry cycle
///
/// `accepted` is scoped to a single chunk's retry sequence; once the sink
/// confirms a record it is never resubmitted.
#[derive(Debug, Clone)]
struct Record {
    data: Vec<u8>,
    partition_key: String,
    accepted: bool,
}

impl Record {
    fn from_event(event: &SyslogEvent) -> Self {
        let data = event.to_record_bytes();
        let mut hasher = DefaultHasher::new();
        data.hash(&mut hasher);
        Self {
            partition_key: hasher.finish().to_string(),
            data,
            accepted: false,
        }
    }
}

/// A sub-batch sized to fit one sink request
#[derive(Debug, Default)]
struct Chunk {
    records: Vec<Record>,
    bytes: usize,
}

impl Chunk {
    fn would_exceed(&self, record_len: usize, config: &PublisherConfig) -> bool {
        self.records.len() + 1 > config.max_chunk_records
            || self.bytes + record_len > config.max_chunk_bytes
    }

    fn push(&mut self, record: Record) {
        self.bytes += record.data.len();
        self.records.push(record);
    }
}

/// Result of one chunk send attempt
enum SendOutcome {
    /// Every record accepted
    Delivered,
    /// Some records rejected or a non-success response; retryable
    TransientFault { failed: usize, errors: String },
}

/// Delivers flushed batches to the sink
pub struct Publisher {
    sink: Arc<dyn RecordSink>,
    config: PublisherConfig,
}

impl Publisher {
    /// Create a publisher over the given sink
    pub fn new(sink: Arc<dyn RecordSink>, config: PublisherConfig) -> Self {
        Self { sink, config }
    }

    /// Drain batches from `rx` until the channel closes
    pub async fn run(self, mut rx: mpsc::UnboundedReceiver<Batch>) {
        tracing::info!(sink = %self.sink.name(), "publisher starting");

        while let Some(batch) = rx.recv().await {
            self.publish(batch).await;
        }

        tracing::info!(sink = %self.sink.name(), "publisher shutting down");
    }

    /// Deliver one batch; completes only after every chunk's retry
    /// sequence has resolved
    pub async fn publish(&self, batch: Batch) {
        if batch.is_empty() {
            return;
        }

        let chunks = split_into_chunks(&batch, &self.config);
        tracing::debug!(
            events = batch.len(),
            chunks = chunks.len(),
            "sending batch to sink"
        );

        let mut handles = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let sink = Arc::clone(&self.sink);
            let config = self.config.clone();
            handles.push(tokio::spawn(async move {
                send_chunk_with_retry(sink, config, chunk).await;
            }));
        }

        for handle in handles {
            // A panicking chunk task only loses that chunk
            let _ = handle.await;
        }
    }
}

/// Serialize a batch and pack it greedily into sink-legal chunks
///
/// A chunk closes as soon as adding the next record would exceed either the
/// record-count or the byte limit. Batch order is preserved across chunks.
fn split_into_chunks(batch: &[SyslogEvent], config: &PublisherConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Chunk::default();

    for event in batch {
        let record = Record::from_event(event);
        if !current.records.is_empty() && current.would_exceed(record.data.len(), config) {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(record);
    }

    if !current.records.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Send one chunk, retrying transient faults with backoff plus jitter
///
/// Records accepted on an earlier attempt are excluded from every resend.
/// Transport-level errors are terminal for the chunk; exhausted retries log
/// the sink's error summary and drop the remainder.
async fn send_chunk_with_retry(
    sink: Arc<dyn RecordSink>,
    config: PublisherConfig,
    mut chunk: Chunk,
) {
    let mut last_errors = String::new();

    for attempt in 0..=config.retry_attempts {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(attempt, &config)).await;
        }

        match send_pending(sink.as_ref(), &mut chunk.records).await {
            Ok(SendOutcome::Delivered) => return,
            Ok(SendOutcome::TransientFault { failed, errors }) => {
                tracing::warn!(
                    sink = %sink.name(),
                    failed,
                    attempt = attempt + 1,
                    errors = %errors,
                    "transient fault writing records to sink"
                );
                last_errors = errors;
            }
            Err(e) => {
                tracing::error!(
                    sink = %sink.name(),
                    error = %e,
                    records = pending_count(&chunk.records),
                    "sink call failed, dropping chunk"
                );
                return;
            }
        }
    }

    tracing::error!(
        sink = %sink.name(),
        records = pending_count(&chunk.records),
        errors = %last_errors,
        "retries exhausted, dropping unaccepted records"
    );
}

/// Submit the not-yet-accepted records once and mark the newly accepted ones
async fn send_pending(
    sink: &dyn RecordSink,
    records: &mut [Record],
) -> Result<SendOutcome, crate::sink::SinkError> {
    let pending: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| !r.accepted)
        .map(|(i, _)| i)
        .collect();

    let request: Vec<SinkRecord> = pending
        .iter()
        .map(|&i| SinkRecord {
            data: records[i].data.clone(),
            partition_key: records[i].partition_key.clone(),
        })
        .collect();

    let response = sink.put_record_batch(request).await?;

    for (&i, result) in pending.iter().zip(response.records.iter()) {
        if result.is_accepted() {
            records[i].accepted = true;
        }
    }

    let failed = response.failed_count();
    if failed > 0 || records.iter().any(|r| !r.accepted) {
        Ok(SendOutcome::TransientFault {
            failed,
            errors: response.error_summary(),
        })
    } else {
        Ok(SendOutcome::Delivered)
    }
}

fn pending_count(records: &[Record]) -> usize {
    records.iter().filter(|r| !r.accepted).count()
}

/// Exponential backoff with jitter: `2^attempt * base + [0, jitter_max)`
fn backoff_delay(attempt: u32, config: &PublisherConfig) -> Duration {
    let exp = config.backoff_base.saturating_mul(1u32 << attempt.min(16));
    let jitter_ms = config.jitter_max.as_millis() as u64;
    if jitter_ms == 0 {
        return exp;
    }
    exp + Duration::from_millis(rand::rng().random_range(0..jitter_ms))
}

#[cfg(test)]
#[path = "publisher_test.rs"]
mod publisher_test;
