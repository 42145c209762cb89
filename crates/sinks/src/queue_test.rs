//! Tests for the batch queue

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use siphon_protocol::{Facility, Severity, SyslogEvent};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::BatchQueue;

fn event(n: usize) -> SyslogEvent {
    SyslogEvent {
        facility: Facility::User,
        severity: Severity::Informational,
        timestamp: Utc::now(),
        host: "host".into(),
        content: format!("message {}", n),
        source_ip: "127.0.0.1".into(),
    }
}

#[tokio::test]
async fn test_no_flush_below_size_trigger() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = BatchQueue::new(100, tx);

    for i in 0..99 {
        queue.enqueue(event(i));
    }

    assert_eq!(queue.len(), 99);
    assert!(rx.try_recv().is_err(), "no batch expected below trigger");
}

#[tokio::test]
async fn test_size_trigger_flushes_exactly_once() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = BatchQueue::new(100, tx);

    for i in 0..100 {
        queue.enqueue(event(i));
    }

    let batch = rx.try_recv().expect("one batch at the trigger");
    assert_eq!(batch.len(), 100);
    assert!(queue.is_empty());
    assert!(rx.try_recv().is_err(), "exactly one batch expected");
}

#[tokio::test]
async fn test_flush_on_empty_queue_is_noop() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = BatchQueue::new(100, tx);

    queue.flush();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_manual_flush_captures_partial_queue() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = BatchQueue::new(100, tx);

    queue.enqueue(event(0));
    queue.enqueue(event(1));
    queue.flush();

    let batch = rx.try_recv().unwrap();
    assert_eq!(batch.len(), 2);
    assert!(queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timer_does_not_flush_before_interval() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = Arc::new(BatchQueue::new(100, tx));
    let cancel = CancellationToken::new();
    let timer = queue.spawn_timer(Duration::from_millis(5000), cancel.clone());

    queue.enqueue(event(0));
    tokio::time::sleep(Duration::from_millis(4000)).await;
    assert!(rx.try_recv().is_err(), "no flush before the interval");

    cancel.cancel();
    let _ = timer.await;
}

#[tokio::test(start_paused = true)]
async fn test_timer_flushes_after_interval() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = Arc::new(BatchQueue::new(100, tx));
    let cancel = CancellationToken::new();
    let timer = queue.spawn_timer(Duration::from_millis(5000), cancel.clone());

    queue.enqueue(event(0));
    tokio::time::sleep(Duration::from_millis(6000)).await;

    let batch = rx.try_recv().expect("timer flush after the interval");
    assert_eq!(batch.len(), 1);

    cancel.cancel();
    let _ = timer.await;
}

#[tokio::test(start_paused = true)]
async fn test_timer_cancel_runs_final_flush() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = Arc::new(BatchQueue::new(100, tx));
    let cancel = CancellationToken::new();
    let timer = queue.spawn_timer(Duration::from_millis(60_000), cancel.clone());

    queue.enqueue(event(0));
    cancel.cancel();
    timer.await.unwrap();

    let batch = rx.try_recv().expect("final flush on cancellation");
    assert_eq!(batch.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_no_loss_no_duplication() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let queue = Arc::new(BatchQueue::new(50, tx));

    let mut handles = Vec::new();
    for task in 0..8 {
        let queue = Arc::clone(&queue);
        handles.push(tokio::spawn(async move {
            for i in 0..250 {
                queue.enqueue(event(task * 1000 + i));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    queue.flush();
    drop(queue);

    let mut seen = std::collections::HashSet::new();
    let mut total = 0usize;
    while let Some(batch) = rx.recv().await {
        for e in batch {
            assert!(seen.insert(e.content.clone()), "duplicate event {}", e.content);
            total += 1;
        }
    }
    assert_eq!(total, 8 * 250, "every enqueued event in exactly one batch");
}
