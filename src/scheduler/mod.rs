//! Periodic replication cycle for the collector node.
//!
//! One cycle reads the whole backlog, re-encodes it as a single bulk
//! payload, ships it to the peer, and wipes the store only once the
//! transport confirmed the send. A failed send leaves every row in place,
//! so the next cycle naturally retries with the union of old and new
//! backlog. Deletion has exactly one call site, reached only after a
//! confirmed send or when every row failed decode and nothing sendable
//! remains; that is what makes master-side data loss impossible by
//! construction.

pub mod daemon;
pub mod stats;

use crate::codec::TelemetryCodec;
use crate::sender::{BulkPayload, BulkTransport};
use crate::store::Repository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub use daemon::SchedulerDaemon;
pub use stats::{SchedulerStats, SchedulerStatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CycleOutcome {
    /// Another cycle was still running; this invocation did nothing.
    Skipped,
    /// Zero rows in the backlog; successful no-op.
    EmptyBacklog,
    /// Sent and cleaned up.
    Completed,
    /// The peer rejected the payload or was unreachable; backlog retained.
    TransmissionFailed,
    /// Local failure before the send (store read or encode); backlog retained.
    Aborted,
    /// Deletion failed after the backlog was shipped (or proved fully
    /// undecodable); rows linger until the next cycle, duplicates absorbed
    /// by the destination's conflict handling.
    CleanupFailed,
}

/// Everything one cycle did, for logs and the stats surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub rows_seen: usize,
    pub records_sent: usize,
    pub decode_failures: usize,
    pub deleted_rows: u64,
    pub sent_bytes: usize,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    fn begin() -> Self {
        Self {
            outcome: CycleOutcome::Aborted,
            rows_seen: 0,
            records_sent: 0,
            decode_failures: 0,
            deleted_rows: 0,
            sent_bytes: 0,
            duration_ms: 0,
            finished_at: Utc::now(),
        }
    }

    fn finish(mut self, outcome: CycleOutcome, started: Instant) -> Self {
        self.outcome = outcome;
        self.duration_ms = started.elapsed().as_millis() as u64;
        self.finished_at = Utc::now();
        self
    }
}

/// Orchestrates read-all, bulk re-encode, transmit, and delete-on-success.
pub struct ReplicationScheduler {
    repository: Repository,
    codec: TelemetryCodec,
    transport: Arc<dyn BulkTransport>,
    stats: Arc<SchedulerStats>,
    running: AtomicBool,
}

impl ReplicationScheduler {
    pub fn new(
        repository: Repository,
        codec: TelemetryCodec,
        transport: Arc<dyn BulkTransport>,
    ) -> Self {
        Self {
            repository,
            codec,
            transport,
            stats: Arc::new(SchedulerStats::new()),
            running: AtomicBool::new(false),
        }
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        self.stats.snapshot()
    }

    /// Runs one replication cycle. Invocations while a cycle is in flight
    /// return immediately with `Skipped`; they are not queued.
    pub async fn run_cycle(&self) -> CycleReport {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("replication cycle already in flight, skipping");
            return CycleReport::begin().finish(CycleOutcome::Skipped, Instant::now());
        }

        let report = self.execute_cycle().await;
        self.running.store(false, Ordering::SeqCst);
        self.stats.record_cycle(&report);
        report
    }

    async fn execute_cycle(&self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::begin();

        let rows = match self.repository.read_all().await {
            Ok(rows) => rows,
            Err(err) => {
                error!(error = %err, "could not read backlog, cycle aborted");
                return report.finish(CycleOutcome::Aborted, started);
            }
        };
        report.rows_seen = rows.len();

        if rows.is_empty() {
            debug!("backlog empty, nothing to replicate");
            return report.finish(CycleOutcome::EmptyBacklog, started);
        }

        // Decode row by row; a corrupt payload costs that row only.
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.codec.decode_one(&row.payload) {
                Ok(record) => records.push(record),
                Err(err) => {
                    report.decode_failures += 1;
                    warn!(row_id = row.id, error = %err, "skipping undecodable row");
                }
            }
        }

        // Nothing sendable survives an all-corrupt backlog; clear the
        // poisoned rows without a network round-trip.
        if records.is_empty() {
            warn!(
                rows = rows.len(),
                "every backlog row failed decode, clearing without transmission"
            );
            return self.clear_backlog(report, started).await;
        }

        // Re-encode the full set as one unit for a better ratio than the
        // per-row payloads achieve individually.
        let original_size = match serde_json::to_vec(&records) {
            Ok(json) => json.len() as u64,
            Err(err) => {
                error!(error = %err, "could not measure bulk payload, cycle aborted");
                return report.finish(CycleOutcome::Aborted, started);
            }
        };
        let bytes = match self.codec.encode_many(&records) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(error = %err, "bulk encode failed, cycle aborted");
                return report.finish(CycleOutcome::Aborted, started);
            }
        };

        let payload = BulkPayload::new(bytes, original_size, records.len());
        report.records_sent = records.len();
        report.sent_bytes = payload.bytes.len();

        let sent = match self.transport.send_bulk(&payload).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, rows = rows.len(), "bulk transmission failed, backlog retained");
                report.records_sent = 0;
                report.sent_bytes = 0;
                return report.finish(CycleOutcome::TransmissionFailed, started);
            }
        };
        if !sent.success {
            warn!(
                status = sent.status,
                rows = rows.len(),
                "peer rejected bulk payload, backlog retained"
            );
            report.records_sent = 0;
            report.sent_bytes = 0;
            return report.finish(CycleOutcome::TransmissionFailed, started);
        }

        self.clear_backlog(report, started).await
    }

    /// Sole deletion point of the pipeline. Reached after a confirmed send,
    /// or directly when the backlog holds no decodable rows.
    async fn clear_backlog(&self, mut report: CycleReport, started: Instant) -> CycleReport {
        match self.repository.delete_all().await {
            Ok(deleted) => {
                report.deleted_rows = deleted;
                info!(
                    rows = report.rows_seen,
                    records = report.records_sent,
                    decode_failures = report.decode_failures,
                    bytes = report.sent_bytes,
                    deleted,
                    "replication cycle complete"
                );
                report.finish(CycleOutcome::Completed, started)
            }
            Err(err) => {
                error!(
                    error = %err,
                    "backlog cleanup failed; rows remain for the next cycle"
                );
                report.finish(CycleOutcome::CleanupFailed, started)
            }
        }
    }
}
