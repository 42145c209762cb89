//! Null sink - discards all records
//!
//! Used for benchmarking the pipeline without any I/O overhead and for
//! validating source configuration. Records are counted, then dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::sink::{PutBatchResponse, RecordSink, SinkError, SinkRecord};

/// Sink that accepts and discards every record
#[derive(Default)]
pub struct NullSink {
    /// Total batch calls received
    batches_received: AtomicU64,

    /// Total records received
    records_received: AtomicU64,

    /// Total bytes received
    bytes_received: AtomicU64,
}

impl NullSink {
    /// Create a null sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Total batch calls so far
    pub fn batches_received(&self) -> u64 {
        self.batches_received.load(Ordering::Relaxed)
    }

    /// Total records so far
    pub fn records_received(&self) -> u64 {
        self.records_received.load(Ordering::Relaxed)
    }

    /// Total bytes so far
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn put_record_batch(
        &self,
        records: Vec<SinkRecord>,
    ) -> Result<PutBatchResponse, SinkError> {
        let bytes: usize = records.iter().map(|r| r.data.len()).sum();
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.records_received
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);

        Ok(PutBatchResponse::all_accepted(records.len()))
    }
}
