//! Transparency counters.
//!
//! Tracks what the pipeline captured, delivered and dropped so hosts can
//! show users (and developers) exactly what left the page.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Live counters, updated from anywhere in the pipeline.
#[derive(Debug)]
pub struct TrackerStats {
    events_tracked: AtomicU64,
    events_delivered: AtomicU64,
    dropped_overflow: AtomicU64,
    dropped_malformed: AtomicU64,
    dropped_transport: AtomicU64,
    batches_sent: AtomicU64,
    batches_failed: AtomicU64,
    beacons_sent: AtomicU64,
    collector_failures: AtomicU64,
    started_at: DateTime<Utc>,
}

impl TrackerStats {
    pub fn new() -> Self {
        Self {
            events_tracked: AtomicU64::new(0),
            events_delivered: AtomicU64::new(0),
            dropped_overflow: AtomicU64::new(0),
            dropped_malformed: AtomicU64::new(0),
            dropped_transport: AtomicU64::new(0),
            batches_sent: AtomicU64::new(0),
            batches_failed: AtomicU64::new(0),
            beacons_sent: AtomicU64::new(0),
            collector_failures: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_tracked(&self) {
        self.events_tracked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self, count: u64) {
        self.events_delivered.fetch_add(count, Ordering::Relaxed);
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overflow(&self, count: u64) {
        self.dropped_overflow.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.dropped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_drop(&self, count: u64) {
        self.dropped_transport.fetch_add(count, Ordering::Relaxed);
        self.batches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_beacon(&self, count: u64) {
        self.events_delivered.fetch_add(count, Ordering::Relaxed);
        self.beacons_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collector_failure(&self) {
        self.collector_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events_tracked: self.events_tracked.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            dropped_malformed: self.dropped_malformed.load(Ordering::Relaxed),
            dropped_transport: self.dropped_transport.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            batches_failed: self.batches_failed.load(Ordering::Relaxed),
            beacons_sent: self.beacons_sent.load(Ordering::Relaxed),
            collector_failures: self.collector_failures.load(Ordering::Relaxed),
            started_at: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Tracker Statistics:\n\
             - Events tracked: {}\n\
             - Events delivered: {} ({} batches, {} beacons)\n\
             - Dropped (queue overflow): {}\n\
             - Dropped (malformed): {}\n\
             - Dropped (delivery failed): {} ({} batches)\n\
             - Collector failures: {}\n\
             - Uptime: {} seconds",
            stats.events_tracked,
            stats.events_delivered,
            stats.batches_sent,
            stats.beacons_sent,
            stats.dropped_overflow,
            stats.dropped_malformed,
            stats.dropped_transport,
            stats.batches_failed,
            stats.collector_failures,
            stats.uptime_secs
        )
    }
}

impl Default for TrackerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`TrackerStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub events_tracked: u64,
    pub events_delivered: u64,
    pub dropped_overflow: u64,
    pub dropped_malformed: u64,
    pub dropped_transport: u64,
    pub batches_sent: u64,
    pub batches_failed: u64,
    pub beacons_sent: u64,
    pub collector_failures: u64,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
}

/// Thread-safe shared stats.
pub type SharedTrackerStats = Arc<TrackerStats>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counting() {
        let stats = TrackerStats::new();
        stats.record_tracked();
        stats.record_tracked();
        stats.record_delivered(2);
        stats.record_overflow(3);
        stats.record_transport_drop(4);
        stats.record_beacon(5);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.events_tracked, 2);
        assert_eq!(snapshot.events_delivered, 7);
        assert_eq!(snapshot.beacons_sent, 1);
        assert_eq!(snapshot.batches_sent, 1);
        assert_eq!(snapshot.dropped_overflow, 3);
        assert_eq!(snapshot.dropped_transport, 4);
        assert_eq!(snapshot.batches_failed, 1);
    }

    #[test]
    fn test_summary_format() {
        let stats = TrackerStats::new();
        let summary = stats.summary();
        assert!(summary.contains("Events tracked"));
        assert!(summary.contains("queue overflow"));
        assert!(summary.contains("Collector failures"));
    }
}
