//! Stdout sink - writes records to standard output
//!
//! The default sink for development: every record (already
//! newline-terminated JSON) is written to stdout and reported accepted.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::sink::{PutBatchResponse, RecordSink, SinkError, SinkRecord};

/// Sink that prints each record to stdout
pub struct StdoutSink {
    name: String,

    /// Total records written
    records_written: AtomicU64,
}

impl StdoutSink {
    /// Create a stdout sink named after the target stream
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records_written: AtomicU64::new(0),
        }
    }

    /// Total records written so far
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordSink for StdoutSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn put_record_batch(
        &self,
        records: Vec<SinkRecord>,
    ) -> Result<PutBatchResponse, SinkError> {
        let mut out = tokio::io::stdout();
        for record in &records {
            out.write_all(&record.data).await?;
        }
        out.flush().await?;

        self.records_written
            .fetch_add(records.len() as u64, Ordering::Relaxed);
        Ok(PutBatchResponse::all_accepted(records.len()))
    }
}
