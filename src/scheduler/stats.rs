// Cumulative replication statistics using atomic operations.

use super::{CycleOutcome, CycleReport};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Lifetime counters across replication cycles. A skipped invocation
/// (single-flight guard) is not a run and leaves these untouched.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    total_runs: AtomicU64,
    successful_runs: AtomicU64,
    failed_runs: AtomicU64,
    total_data_sent: AtomicU64,
    total_containers_processed: AtomicU64,
    total_data_cleaned: AtomicU64,
    cleanup_operations: AtomicU64,
    last_run_ms: AtomicI64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, report: &CycleReport) {
        match report.outcome {
            CycleOutcome::Skipped => return,
            CycleOutcome::EmptyBacklog => {
                self.successful_runs.fetch_add(1, Ordering::Relaxed);
            }
            CycleOutcome::Completed => {
                self.successful_runs.fetch_add(1, Ordering::Relaxed);
                self.total_data_sent
                    .fetch_add(report.sent_bytes as u64, Ordering::Relaxed);
                self.total_containers_processed
                    .fetch_add(report.records_sent as u64, Ordering::Relaxed);
                self.total_data_cleaned
                    .fetch_add(report.deleted_rows, Ordering::Relaxed);
                self.cleanup_operations.fetch_add(1, Ordering::Relaxed);
            }
            CycleOutcome::TransmissionFailed
            | CycleOutcome::Aborted
            | CycleOutcome::CleanupFailed => {
                self.failed_runs.fetch_add(1, Ordering::Relaxed);
                if report.outcome == CycleOutcome::CleanupFailed {
                    // The send itself was confirmed before cleanup failed
                    self.total_data_sent
                        .fetch_add(report.sent_bytes as u64, Ordering::Relaxed);
                    self.total_containers_processed
                        .fetch_add(report.records_sent as u64, Ordering::Relaxed);
                }
            }
        }

        self.total_runs.fetch_add(1, Ordering::Relaxed);
        self.last_run_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SchedulerStatsSnapshot {
        let last = self.last_run_ms.load(Ordering::Relaxed);
        let last_run = DateTime::<Utc>::from_timestamp_millis(last)
            .filter(|_| last > 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true));

        SchedulerStatsSnapshot {
            total_runs: self.total_runs.load(Ordering::Relaxed),
            successful_runs: self.successful_runs.load(Ordering::Relaxed),
            failed_runs: self.failed_runs.load(Ordering::Relaxed),
            last_run,
            total_data_sent: self.total_data_sent.load(Ordering::Relaxed),
            total_containers_processed: self.total_containers_processed.load(Ordering::Relaxed),
            total_data_cleaned: self.total_data_cleaned.load(Ordering::Relaxed),
            cleanup_operations: self.cleanup_operations.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot served to the route layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatsSnapshot {
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<String>,
    pub total_data_sent: u64,
    pub total_containers_processed: u64,
    pub total_data_cleaned: u64,
    pub cleanup_operations: u64,
}
