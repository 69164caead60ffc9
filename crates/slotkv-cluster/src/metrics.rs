//! Router metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// Snapshot of router metrics at a point in time.
pub struct MetricsSnapshot {
    /// Calls issued through `run`.
    pub calls: u64,
    /// Calls that returned a reply.
    pub successes: u64,
    /// Calls that returned an error.
    pub failures: u64,
    /// MOVED/ASK replies followed.
    pub redirects: u64,
    /// Requests that failed at the transport level.
    pub transport_failures: u64,
    /// Connection acquisitions that failed.
    pub connect_failures: u64,
    /// Calls that ran out of attempts.
    pub ttl_exhausted: u64,
    /// Completed topology rebuilds.
    pub topology_refreshes: u64,
    /// Topology rebuilds where no node answered.
    pub topology_failures: u64,
}

/// Thread-safe router metrics collector.
#[derive(Default)]
pub struct RouterMetrics {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    redirects: AtomicU64,
    transport_failures: AtomicU64,
    connect_failures: AtomicU64,
    ttl_exhausted: AtomicU64,
    topology_refreshes: AtomicU64,
    topology_failures: AtomicU64,
}

impl std::fmt::Debug for RouterMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl RouterMetrics {
    /// Creates a collector with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc_calls(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_successes(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_redirects(&self) {
        self.redirects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_transport_failures(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_connect_failures(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_ttl_exhausted(&self) {
        self.ttl_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_topology_refreshes(&self) {
        self.topology_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn inc_topology_failures(&self) {
        self.topology_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            redirects: self.redirects.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            ttl_exhausted: self.ttl_exhausted.load(Ordering::Relaxed),
            topology_refreshes: self.topology_refreshes.load(Ordering::Relaxed),
            topology_failures: self.topology_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_snapshot() {
        let metrics = RouterMetrics::new();
        metrics.inc_calls();
        metrics.inc_calls();
        metrics.inc_successes();
        metrics.inc_redirects();
        metrics.inc_topology_failures();

        let snap = metrics.snapshot();
        assert_eq!(snap.calls, 2);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.redirects, 1);
        assert_eq!(snap.topology_failures, 1);
        assert_eq!(snap.failures, 0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = RouterMetrics::new();
        metrics.inc_ttl_exhausted();
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["ttl_exhausted"], 1);
        assert_eq!(json["calls"], 0);
    }
}
