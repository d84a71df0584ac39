//! Source-reliability tracking.
//!
//! One counter pair per source, updated only by explicit operator
//! feedback. Reliability feeds the conflict resolver's score; a snapshot
//! read is enough there, so readers never block writers for long.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Reliability assumed for a source that has no feedback yet.
pub const DEFAULT_RELIABILITY: f64 = 0.8;

/// Feedback counters for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityRecord {
    /// Total claims judged.
    pub claim_count: u64,
    /// Claims judged correct.
    pub correct_count: u64,
}

impl ReliabilityRecord {
    /// Empirical reliability, or the default when no feedback exists.
    pub fn reliability(&self) -> f64 {
        if self.claim_count == 0 {
            DEFAULT_RELIABILITY
        } else {
            self.correct_count as f64 / self.claim_count as f64
        }
    }
}

/// Tracker of per-source reliability scores.
#[derive(Debug, Default)]
pub struct ReliabilityTracker {
    records: RwLock<BTreeMap<String, ReliabilityRecord>>,
}

impl ReliabilityTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a tracker from persisted records.
    pub fn from_records(records: BTreeMap<String, ReliabilityRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Record one feedback judgement for a source.
    pub fn update(&self, source: &str, correct: bool) {
        let mut records = self.records.write();
        let record = records.entry(source.to_string()).or_default();
        record.claim_count += 1;
        if correct {
            record.correct_count += 1;
        }
        tracing::debug!(
            source = %source,
            correct,
            claim_count = record.claim_count,
            reliability = record.reliability(),
            "reliability updated"
        );
    }

    /// Current reliability for a source.
    pub fn reliability(&self, source: &str) -> f64 {
        self.records
            .read()
            .get(source)
            .copied()
            .unwrap_or_default()
            .reliability()
    }

    /// Consistent snapshot of every source's reliability, for scoring.
    pub fn snapshot(&self) -> BTreeMap<String, f64> {
        self.records
            .read()
            .iter()
            .map(|(source, record)| (source.clone(), record.reliability()))
            .collect()
    }

    /// Raw counter records, for persistence.
    pub fn records(&self) -> BTreeMap<String, ReliabilityRecord> {
        self.records.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reliability() {
        let tracker = ReliabilityTracker::new();
        assert_eq!(tracker.reliability("unseen"), DEFAULT_RELIABILITY);
    }

    #[test]
    fn test_update_moves_score() {
        let tracker = ReliabilityTracker::new();
        tracker.update("router-log", true);
        tracker.update("router-log", true);
        tracker.update("router-log", false);
        assert!((tracker.reliability("router-log") - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_all_incorrect() {
        let tracker = ReliabilityTracker::new();
        tracker.update("flaky", false);
        assert_eq!(tracker.reliability("flaky"), 0.0);
    }

    #[test]
    fn test_snapshot_only_has_seen_sources() {
        let tracker = ReliabilityTracker::new();
        tracker.update("a", true);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a").copied(), Some(1.0));
    }

    #[test]
    fn test_round_trip_records() {
        let tracker = ReliabilityTracker::new();
        tracker.update("a", true);
        tracker.update("a", false);
        let restored = ReliabilityTracker::from_records(tracker.records());
        assert_eq!(restored.reliability("a"), 0.5);
    }
}
