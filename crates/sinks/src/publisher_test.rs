//! Tests for batch chunking, delivery, and retry

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use siphon_protocol::{Facility, Severity, SyslogEvent};
use tokio::sync::mpsc;

use super::*;
use crate::sink::{PutBatchResponse, RecordResult, RecordSink, SinkError, SinkRecord};

fn event(n: usize) -> SyslogEvent {
    SyslogEvent {
        facility: Facility::Local0,
        severity: Severity::Notice,
        timestamp: Utc::now(),
        host: "host".into(),
        content: format!("message {}", n),
        source_ip: "10.0.0.1".into(),
    }
}

fn fast_config() -> PublisherConfig {
    PublisherConfig {
        retry_attempts: 4,
        backoff_base: Duration::ZERO,
        jitter_max: Duration::ZERO,
        ..PublisherConfig::default()
    }
}

/// One scripted response from the mock sink
enum Script {
    AcceptAll,
    /// Fail the submitted records at these positions
    FailAt(Vec<usize>),
    TransportError,
}

/// Sink that replays a script and records every call it receives
struct ScriptedSink {
    script: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Vec<SinkRecord>>>,
}

impl ScriptedSink {
    fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Vec<SinkRecord>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RecordSink for ScriptedSink {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn put_record_batch(
        &self,
        records: Vec<SinkRecord>,
    ) -> Result<PutBatchResponse, SinkError> {
        self.calls.lock().push(records.clone());

        let step = self.script.lock().pop_front().unwrap_or(Script::AcceptAll);
        match step {
            Script::AcceptAll => Ok(PutBatchResponse::all_accepted(records.len())),
            Script::FailAt(positions) => Ok(PutBatchResponse {
                records: (0..records.len())
                    .map(|i| {
                        if positions.contains(&i) {
                            RecordResult::failed("ServiceUnavailable", "slow down")
                        } else {
                            RecordResult::accepted()
                        }
                    })
                    .collect(),
            }),
            Script::TransportError => {
                Err(SinkError::CallFailed("connection reset".into()))
            }
        }
    }
}

#[test]
fn test_split_respects_record_limit() {
    let config = PublisherConfig {
        max_chunk_records: 10,
        ..PublisherConfig::default()
    };
    let batch: Vec<SyslogEvent> = (0..25).map(event).collect();

    let chunks = split_into_chunks(&batch, &config);

    assert_eq!(chunks.len(), 3);
    let sizes: Vec<usize> = chunks.iter().map(|c| c.records.len()).collect();
    assert_eq!(sizes, vec![10, 10, 5]);
    for chunk in &chunks {
        assert!(chunk.records.len() <= config.max_chunk_records);
        assert!(chunk.bytes <= config.max_chunk_bytes);
    }
}

#[test]
fn test_split_respects_byte_limit() {
    let batch: Vec<SyslogEvent> = (0..8).map(event).collect();
    let record_len = batch[0].to_record_bytes().len();
    // Room for two records per chunk, not three
    let config = PublisherConfig {
        max_chunk_bytes: record_len * 2 + record_len / 2,
        ..PublisherConfig::default()
    };

    let chunks = split_into_chunks(&batch, &config);

    assert_eq!(chunks.len(), 4);
    for chunk in &chunks {
        assert!(chunk.bytes <= config.max_chunk_bytes);
    }
}

#[test]
fn test_split_preserves_order_and_loses_nothing() {
    let config = PublisherConfig {
        max_chunk_records: 3,
        ..PublisherConfig::default()
    };
    let batch: Vec<SyslogEvent> = (0..10).map(event).collect();

    let chunks = split_into_chunks(&batch, &config);

    let flattened: Vec<Vec<u8>> = chunks
        .iter()
        .flat_map(|c| c.records.iter().map(|r| r.data.clone()))
        .collect();
    let expected: Vec<Vec<u8>> = batch.iter().map(|e| e.to_record_bytes()).collect();
    assert_eq!(flattened, expected);
}

#[test]
fn test_partition_key_is_stable_per_payload() {
    // Same event (same serialized bytes) must always hash to the same key
    let first = event(1);
    let second = event(2);
    let a = Record::from_event(&first);
    let b = Record::from_event(&second);
    assert_eq!(a.partition_key, Record::from_event(&first).partition_key);
    assert_ne!(a.partition_key, b.partition_key);
}

#[tokio::test]
async fn test_publish_sends_every_chunk() {
    let sink = ScriptedSink::new(vec![]);
    let config = PublisherConfig {
        max_chunk_records: 10,
        ..fast_config()
    };
    let publisher = Publisher::new(sink.clone(), config);

    publisher.publish((0..25).map(event).collect()).await;

    // Chunks are sent concurrently, so compare sizes as a multiset
    let mut sizes: Vec<usize> = sink.calls().iter().map(|c| c.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![5, 10, 10]);
}

#[tokio::test]
async fn test_publish_empty_batch_is_noop() {
    let sink = ScriptedSink::new(vec![]);
    let publisher = Publisher::new(sink.clone(), fast_config());

    publisher.publish(Vec::new()).await;

    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn test_retry_resends_only_unaccepted_records() {
    // First call rejects the even positions, second call accepts the rest
    let sink = ScriptedSink::new(vec![Script::FailAt(vec![0, 2, 4, 6, 8]), Script::AcceptAll]);
    let config = fast_config();
    let batch: Vec<SyslogEvent> = (0..10).map(event).collect();
    let chunks = split_into_chunks(&batch, &config);
    assert_eq!(chunks.len(), 1);

    send_chunk_with_retry(sink.clone(), config, chunks.into_iter().next().unwrap()).await;

    let calls = sink.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].len(), 10);
    assert_eq!(calls[1].len(), 5);

    let rejected: Vec<Vec<u8>> = [0usize, 2, 4, 6, 8]
        .iter()
        .map(|&i| calls[0][i].data.clone())
        .collect();
    let resent: Vec<Vec<u8>> = calls[1].iter().map(|r| r.data.clone()).collect();
    assert_eq!(resent, rejected, "retry must carry only the rejected records");
}

#[tokio::test]
async fn test_transport_error_is_terminal() {
    let sink = ScriptedSink::new(vec![Script::TransportError, Script::AcceptAll]);
    let config = fast_config();
    let batch: Vec<SyslogEvent> = (0..5).map(event).collect();
    let chunks = split_into_chunks(&batch, &config);

    send_chunk_with_retry(sink.clone(), config, chunks.into_iter().next().unwrap()).await;

    assert_eq!(sink.calls().len(), 1, "no retry after a transport error");
}

#[tokio::test]
async fn test_retries_exhaust_and_drop() {
    let sink = ScriptedSink::new(vec![
        Script::FailAt(vec![0]),
        Script::FailAt(vec![0]),
        Script::FailAt(vec![0]),
    ]);
    let config = PublisherConfig {
        retry_attempts: 2,
        ..fast_config()
    };
    let batch: Vec<SyslogEvent> = (0..3).map(event).collect();
    let chunks = split_into_chunks(&batch, &config);

    send_chunk_with_retry(sink.clone(), config, chunks.into_iter().next().unwrap()).await;

    let calls = sink.calls();
    assert_eq!(calls.len(), 3, "first attempt plus two retries");
    assert_eq!(calls[0].len(), 3);
    assert_eq!(calls[1].len(), 1);
    assert_eq!(calls[2].len(), 1);
}

#[tokio::test]
async fn test_run_drains_until_channel_closes() {
    let sink = ScriptedSink::new(vec![]);
    let publisher = Publisher::new(sink.clone(), fast_config());
    let (tx, rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(publisher.run(rx));
    tx.send((0..3).map(event).collect()).unwrap();
    tx.send((0..2).map(event).collect()).unwrap();
    drop(tx);
    task.await.unwrap();

    let mut sizes: Vec<usize> = sink.calls().iter().map(|c| c.len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 3]);
}

#[test]
fn test_backoff_grows_exponentially() {
    let config = PublisherConfig {
        backoff_base: Duration::from_millis(150),
        jitter_max: Duration::ZERO,
        ..PublisherConfig::default()
    };
    assert_eq!(backoff_delay(1, &config), Duration::from_millis(300));
    assert_eq!(backoff_delay(2, &config), Duration::from_millis(600));
    assert_eq!(backoff_delay(3, &config), Duration::from_millis(1200));
    assert_eq!(backoff_delay(4, &config), Duration::from_millis(2400));
}

#[test]
fn test_backoff_jitter_stays_in_bounds() {
    let config = PublisherConfig {
        backoff_base: Duration::from_millis(150),
        jitter_max: Duration::from_millis(100),
        ..PublisherConfig::default()
    };
    for _ in 0..50 {
        let delay = backoff_delay(1, &config);
        assert!(delay >= Duration::from_millis(300));
        assert!(delay < Duration::from_millis(400));
    }
}
