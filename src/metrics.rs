//! Test-observable metrics counters.
//!
//! Remote history re-replication is the one external call a standby makes
//! on its own initiative, so it gets a dedicated request counter and
//! latency accumulator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters for the history re-replication scope.
#[derive(Debug, Default)]
pub struct StandbyMetrics {
    rereplication_requests: AtomicU64,
    rereplication_latency_ms: AtomicU64,
}

/// Snapshot of the counters for tests and diagnostics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StandbyMetricsSnapshot {
    pub rereplication_requests: u64,
    pub rereplication_latency_ms: u64,
}

impl StandbyMetrics {
    pub fn record_rereplication_request(&self) {
        self.rereplication_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rereplication_latency(&self, elapsed: Duration) {
        self.rereplication_latency_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StandbyMetricsSnapshot {
        StandbyMetricsSnapshot {
            rereplication_requests: self.rereplication_requests.load(Ordering::Relaxed),
            rereplication_latency_ms: self.rereplication_latency_ms.load(Ordering::Relaxed),
        }
    }
}
