use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// In-process usage counters, exposed through the status surface.
#[derive(Debug, Default)]
pub struct GatewayStats {
    total_calls: AtomicU64,
    successes: AtomicU64,
    transient_failures: AtomicU64,
    fatal_failures: AtomicU64,
    quota_waits: AtomicU64,
    circuit_rejections: AtomicU64,
    deadline_expiries: AtomicU64
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    pub successes: u64,
    pub transient_failures: u64,
    pub fatal_failures: u64,
    pub quota_waits: u64,
    pub circuit_rejections: u64,
    pub deadline_expiries: u64
}

impl GatewayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transient_failure(&self) {
        self.transient_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fatal_failure(&self) {
        self.fatal_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_quota_wait(&self) {
        self.quota_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_rejection(&self) {
        self.circuit_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deadline_expiry(&self) {
        self.deadline_expiries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
            fatal_failures: self.fatal_failures.load(Ordering::Relaxed),
            quota_waits: self.quota_waits.load(Ordering::Relaxed),
            circuit_rejections: self.circuit_rejections.load(Ordering::Relaxed),
            deadline_expiries: self.deadline_expiries.load(Ordering::Relaxed)
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.total_calls,
            &self.successes,
            &self.transient_failures,
            &self.fatal_failures,
            &self.quota_waits,
            &self.circuit_rejections,
            &self.deadline_expiries,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let stats = GatewayStats::new();
        stats.record_call();
        stats.record_call();
        stats.record_success();
        stats.record_transient_failure();
        stats.record_quota_wait();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_calls, 2);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.transient_failures, 1);
        assert_eq!(snapshot.quota_waits, 1);

        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }
}
