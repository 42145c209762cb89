//! Record sink interface
//!
//! The batch ingestion service is opaque to the core: a network call that
//! accepts a bounded list of byte records and reports per-record success or
//! failure. Concrete managed-service transports implement this trait.

use async_trait::async_trait;
use thiserror::Error;

/// One serialized record submitted to the sink
#[derive(Debug, Clone)]
pub struct SinkRecord {
    /// Serialized event bytes
    pub data: Vec<u8>,

    /// Partition key, derived from a hash of the bytes
    pub partition_key: String,
}

/// Per-record outcome of a batch call
#[derive(Debug, Clone, Default)]
pub struct RecordResult {
    /// Error code when the sink rejected this record
    pub error_code: Option<String>,

    /// Human-readable error detail
    pub error_message: Option<String>,
}

impl RecordResult {
    /// An accepted record
    pub fn accepted() -> Self {
        Self::default()
    }

    /// A rejected record with the sink's error code and message
    pub fn failed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }

    /// Whether the sink accepted this record
    #[inline]
    pub fn is_accepted(&self) -> bool {
        self.error_code.is_none()
    }
}

/// Response to one batch call
///
/// `records` is aligned 1:1 with the submitted batch.
#[derive(Debug, Clone, Default)]
pub struct PutBatchResponse {
    /// Per-record outcomes, in submission order
    pub records: Vec<RecordResult>,
}

impl PutBatchResponse {
    /// A response accepting all `count` records
    pub fn all_accepted(count: usize) -> Self {
        Self {
            records: vec![RecordResult::accepted(); count],
        }
    }

    /// Number of rejected records
    pub fn failed_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_accepted()).count()
    }

    /// Distinct "code:message" pairs of the rejected records, for logging
    pub fn error_summary(&self) -> String {
        let mut errors: Vec<String> = self
            .records
            .iter()
            .filter(|r| !r.is_accepted())
            .map(|r| {
                format!(
                    "{}:{}",
                    r.error_code.as_deref().unwrap_or(""),
                    r.error_message.as_deref().unwrap_or("")
                )
            })
            .collect();
        errors.sort();
        errors.dedup();
        errors.join(", ")
    }
}

/// Errors from the sink transport itself
///
/// Distinct from per-record rejection: a transport error means the call as a
/// whole did not happen, and the publisher treats it as terminal for the
/// chunk rather than retrying.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink call could not be made or returned no usable response
    #[error("sink call failed: {0}")]
    CallFailed(String),

    /// I/O error writing records
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Batch ingestion service interface
///
/// Implementations must tolerate repeated submission of the same record
/// (delivery is at-least-once) and report outcomes aligned with the request.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Sink name for log context
    fn name(&self) -> &str;

    /// Submit one bounded batch of records
    async fn put_record_batch(
        &self,
        records: Vec<SinkRecord>,
    ) -> Result<PutBatchResponse, SinkError>;
}
