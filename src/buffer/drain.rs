use super::queue::IngestionQueue;
use crate::store::Repository;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Result of one drain pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainSummary {
    pub drained: usize,
    pub inserted: u64,
    pub lost: usize,
    pub batches: usize,
    pub failed_batches: usize,
}

/// Moves queue contents into the repository on a fixed cadence, with an
/// early pass when the queue signals its high-water mark. A single loop
/// runs per worker, so drains never overlap themselves.
///
/// A batch that fails to persist is dropped, not re-queued; the loss is
/// logged and counted.
pub struct DrainWorker {
    queue: Arc<IngestionQueue>,
    repository: Repository,
    interval: Duration,
    batch_max_size: usize,
}

impl DrainWorker {
    pub fn new(
        queue: Arc<IngestionQueue>,
        repository: Repository,
        interval: Duration,
        batch_max_size: usize,
    ) -> Self {
        Self {
            queue,
            repository,
            interval,
            batch_max_size: batch_max_size.max(1),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            batch_max_size = self.batch_max_size,
            "ingestion drain worker started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.queue.high_water_crossed() => {
                    debug!("queue crossed high-water mark, draining early");
                }
            }
            self.drain_once().await;
        }
    }

    /// One drain pass: snapshot the queue, persist in bounded batches.
    /// Callable directly so tests can step the pipeline without timers.
    pub async fn drain_once(&self) -> DrainSummary {
        let items = self.queue.take_all();
        if items.is_empty() {
            return DrainSummary::default();
        }

        let mut summary = DrainSummary {
            drained: items.len(),
            ..DrainSummary::default()
        };

        for chunk in items.chunks(self.batch_max_size) {
            summary.batches += 1;
            match self.repository.batch_insert(chunk).await {
                Ok(inserted) => summary.inserted += inserted,
                Err(err) => {
                    summary.failed_batches += 1;
                    summary.lost += chunk.len();
                    self.queue.note_batch_failure(chunk.len());
                    error!(
                        error = %err,
                        records = chunk.len(),
                        "batch insert failed, drained records dropped"
                    );
                }
            }
        }

        debug!(
            drained = summary.drained,
            inserted = summary.inserted,
            batches = summary.batches,
            "drain pass complete"
        );
        summary
    }
}
