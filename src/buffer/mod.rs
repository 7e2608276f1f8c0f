//! In-memory ingestion buffering.
//!
//! The queue decouples the fast accept path from persistence latency; the
//! drain worker moves accumulated items into the store in transactional
//! batches.

pub mod drain;
pub mod queue;

pub use drain::{DrainSummary, DrainWorker};
pub use queue::{EnqueueReceipt, IngestionQueue, QueueError, QueueStatsSnapshot};
