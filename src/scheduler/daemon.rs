use super::{CycleOutcome, ReplicationScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Drives the replication scheduler on a fixed period. The scheduler itself
/// stays shared, so out-of-band runs can be triggered on the same instance
/// without fighting the timer; single-flight arbitration lives in
/// [`ReplicationScheduler::run_cycle`].
pub struct SchedulerDaemon {
    scheduler: Arc<ReplicationScheduler>,
    interval: Duration,
}

impl SchedulerDaemon {
    pub fn new(scheduler: Arc<ReplicationScheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            "replication daemon started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the first
        // cycle runs one full period after startup.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let report = self.scheduler.run_cycle().await;
            match report.outcome {
                CycleOutcome::Completed | CycleOutcome::EmptyBacklog => info!(
                    outcome = ?report.outcome,
                    records = report.records_sent,
                    bytes = report.sent_bytes,
                    duration_ms = report.duration_ms,
                    "scheduled replication cycle finished"
                ),
                CycleOutcome::Skipped => {}
                outcome => error!(
                    ?outcome,
                    rows = report.rows_seen,
                    duration_ms = report.duration_ms,
                    "scheduled replication cycle failed"
                ),
            }
        }
    }
}
