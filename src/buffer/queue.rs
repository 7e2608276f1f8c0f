use crate::domain::{MissingContainerId, QueueItem, TelemetryRecord};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid queue capacity")]
    InvalidCapacity,
    #[error("Queue is full (capacity {capacity})")]
    Full { capacity: usize },
    #[error(transparent)]
    InvalidRecord(#[from] MissingContainerId),
}

/// Returned to the ingestion boundary on accept.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    pub accepted: bool,
    pub queue_position: usize,
    pub estimated_next_drain_ms: u64,
}

/// Counter snapshot for the stats surface.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatsSnapshot {
    pub capacity: usize,
    pub len: usize,
    pub enqueued: u64,
    pub rejected: u64,
    pub drained_records: u64,
    pub drain_count: u64,
    pub failed_batches: u64,
    pub records_lost: u64,
}

/// Bounded in-memory buffer between the ingestion boundary and the store.
///
/// Accepting a record touches only this queue and returns immediately; the
/// drain worker moves contents to the repository on its own cadence. The
/// bound is a hard backpressure signal: a full queue rejects, it never
/// drops older items.
pub struct IngestionQueue {
    items: Mutex<VecDeque<QueueItem>>,
    capacity: usize,
    high_water_mark: usize,
    high_water: Notify,
    drain_interval_ms: u64,
    last_drain_at_ms: AtomicI64,
    // Atomic counters for lock-free stats reads
    enqueued: AtomicU64,
    rejected: AtomicU64,
    drained_records: AtomicU64,
    drain_count: AtomicU64,
    failed_batches: AtomicU64,
    records_lost: AtomicU64,
}

impl IngestionQueue {
    pub fn new(capacity: usize, drain_interval: Duration) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }

        Ok(Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            // Early drain fires once the queue is 80% full
            high_water_mark: (capacity * 8 / 10).max(1),
            high_water: Notify::new(),
            drain_interval_ms: drain_interval.as_millis() as u64,
            last_drain_at_ms: AtomicI64::new(Utc::now().timestamp_millis()),
            enqueued: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            drained_records: AtomicU64::new(0),
            drain_count: AtomicU64::new(0),
            failed_batches: AtomicU64::new(0),
            records_lost: AtomicU64::new(0),
        })
    }

    /// Validates and accepts one record, stamping its ingestion timestamp.
    /// Never blocks on persistence or network I/O.
    pub fn enqueue(&self, mut record: TelemetryRecord) -> Result<EnqueueReceipt, QueueError> {
        record.validate()?;
        record.ensure_ingestion_timestamp();

        let queue_position = {
            let mut items = self.items.lock();
            if items.len() >= self.capacity {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Err(QueueError::Full {
                    capacity: self.capacity,
                });
            }
            items.push_back(QueueItem::new(record));
            items.len()
        };

        self.enqueued.fetch_add(1, Ordering::Relaxed);
        if queue_position >= self.high_water_mark {
            self.high_water.notify_one();
        }

        Ok(EnqueueReceipt {
            accepted: true,
            queue_position,
            estimated_next_drain_ms: self.estimate_next_drain_ms(),
        })
    }

    /// Atomically takes the entire queue contents, leaving a fresh empty
    /// queue behind. Enqueues arriving afterwards never interleave with
    /// the returned batch.
    pub fn take_all(&self) -> Vec<QueueItem> {
        let drained = {
            let mut items = self.items.lock();
            std::mem::take(&mut *items)
        };

        self.last_drain_at_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
        self.drain_count.fetch_add(1, Ordering::Relaxed);
        self.drained_records
            .fetch_add(drained.len() as u64, Ordering::Relaxed);

        Vec::from(drained)
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            capacity: self.capacity,
            len: self.len(),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            drained_records: self.drained_records.load(Ordering::Relaxed),
            drain_count: self.drain_count.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            records_lost: self.records_lost.load(Ordering::Relaxed),
        }
    }

    /// Resolves when the queue crosses its high-water mark.
    pub(crate) async fn high_water_crossed(&self) {
        self.high_water.notified().await;
    }

    pub(crate) fn note_batch_failure(&self, lost: usize) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
        self.records_lost.fetch_add(lost as u64, Ordering::Relaxed);
    }

    fn estimate_next_drain_ms(&self) -> u64 {
        let last = self.last_drain_at_ms.load(Ordering::Relaxed);
        let elapsed = Utc::now().timestamp_millis().saturating_sub(last).max(0) as u64;
        self.drain_interval_ms.saturating_sub(elapsed)
    }
}

impl std::fmt::Debug for IngestionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("enqueued", &self.enqueued.load(Ordering::Relaxed))
            .field("rejected", &self.rejected.load(Ordering::Relaxed))
            .finish()
    }
}
