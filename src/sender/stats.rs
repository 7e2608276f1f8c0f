// Lock-free transport statistics using atomic operations.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Aggregate counters across bulk sends, per-record forwards, and health
/// probes. Shared behind an `Arc` by everything that touches the network.
#[derive(Debug, Default)]
pub struct TransportStats {
    bulk_sends: AtomicU64,
    bulk_failures: AtomicU64,
    bulk_bytes_sent: AtomicU64,
    forwards: AtomicU64,
    forward_conflicts: AtomicU64,
    forward_failures: AtomicU64,
    health_probes: AtomicU64,
    health_failures: AtomicU64,
    last_send_time: AtomicU64,
}

impl TransportStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_bulk(&self, success: bool, bytes: u64) {
        self.bulk_sends.fetch_add(1, Ordering::Relaxed);
        if success {
            self.bulk_bytes_sent.fetch_add(bytes, Ordering::Relaxed);
            self.touch_last_send();
        } else {
            self.bulk_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_forward(&self, success: bool, already_exists: bool) {
        self.forwards.fetch_add(1, Ordering::Relaxed);
        if already_exists {
            self.forward_conflicts.fetch_add(1, Ordering::Relaxed);
        }
        if success {
            self.touch_last_send();
        } else {
            self.forward_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_health(&self, success: bool) {
        self.health_probes.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.health_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> TransportStatsSnapshot {
        TransportStatsSnapshot {
            bulk_sends: self.bulk_sends.load(Ordering::Relaxed),
            bulk_failures: self.bulk_failures.load(Ordering::Relaxed),
            bulk_bytes_sent: self.bulk_bytes_sent.load(Ordering::Relaxed),
            forwards: self.forwards.load(Ordering::Relaxed),
            forward_conflicts: self.forward_conflicts.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            health_probes: self.health_probes.load(Ordering::Relaxed),
            health_failures: self.health_failures.load(Ordering::Relaxed),
            last_send_time: self.last_send_time.load(Ordering::Relaxed),
        }
    }

    fn touch_last_send(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.last_send_time.store(now, Ordering::Relaxed);
    }
}

/// Immutable snapshot for the stats surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportStatsSnapshot {
    pub bulk_sends: u64,
    pub bulk_failures: u64,
    pub bulk_bytes_sent: u64,
    pub forwards: u64,
    pub forward_conflicts: u64,
    pub forward_failures: u64,
    pub health_probes: u64,
    pub health_failures: u64,
    pub last_send_time: u64,
}

impl TransportStatsSnapshot {
    pub fn forward_success_rate(&self) -> f64 {
        if self.forwards == 0 {
            return 1.0;
        }
        (self.forwards.saturating_sub(self.forward_failures) as f64) / (self.forwards as f64)
    }
}
