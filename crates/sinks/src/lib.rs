//! Siphon Sinks - batched, size-bounded, retried delivery
//!
//! Parsed events flow through two cooperating pieces:
//!
//! - `BatchQueue` - thread-safe queue with two racing flush triggers
//!   (item-count threshold and a wall-clock timer); a flush atomically swaps
//!   the queue and hands the captured batch to the publisher without ever
//!   blocking enqueuers
//! - `Publisher` - splits a batch into sink-legal chunks (max record count
//!   and cumulative byte size), sends chunks concurrently with
//!   exponential-backoff-plus-jitter retry, and never re-sends a record the
//!   sink already accepted
//!
//! The sink itself is an interface (`RecordSink`); `StdoutSink` and
//! `NullSink` ship in-tree, managed ingestion services implement the trait
//! out of tree. Delivery is best-effort: terminal sink failure is logged,
//! never escalated.

mod null;
mod publisher;
mod queue;
mod sink;
mod stdout;

pub use null::NullSink;
pub use publisher::{Publisher, PublisherConfig};
pub use queue::{Batch, BatchQueue};
pub use sink::{PutBatchResponse, RecordResult, RecordSink, SinkError, SinkRecord};
pub use stdout::StdoutSink;
