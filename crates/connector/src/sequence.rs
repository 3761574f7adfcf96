use obrec_book::DepthUpdate;
use serde::{Deserialize, Serialize};

/// How update ids from the venue are checked before a message is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequencePolicy {
    /// Record every id as received; never skip or resync.
    Trust,
    /// Skip stale updates and resync the book when ids jump forward.
    #[default]
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    Apply,
    /// Already covered by the current book
    Stale { last: u64, received: u64 },
    /// Updates between `expected` and `received` were never seen
    Gap { expected: u64, received: u64 },
}

/// Last applied update id for one book.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    policy: SequencePolicy,
    last: Option<u64>,
}

impl SequenceTracker {
    pub fn new(policy: SequencePolicy) -> Self {
        Self { policy, last: None }
    }

    pub fn policy(&self) -> SequencePolicy {
        self.policy
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }

    pub fn check(&self, update: &DepthUpdate) -> SequenceCheck {
        if self.policy == SequencePolicy::Trust || update.is_snapshot() {
            return SequenceCheck::Apply;
        }
        let (Some(last), Some(received)) = (self.last, update.sequence) else {
            return SequenceCheck::Apply;
        };
        if received <= last {
            return SequenceCheck::Stale { last, received };
        }
        // Only venues that report the first id of each message are contiguous
        let Some(first) = update.first_sequence else {
            return SequenceCheck::Apply;
        };
        let expected = last + 1;
        if first > expected {
            return SequenceCheck::Gap {
                expected,
                received: first,
            };
        }
        SequenceCheck::Apply
    }

    /// Remember the id of an applied update.
    pub fn record(&mut self, update: &DepthUpdate) {
        if let Some(seq) = update.sequence {
            self.last = Some(seq);
        }
    }

    /// Forget the baseline, e.g. after the book was cleared.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(first: u64, last: u64) -> DepthUpdate {
        DepthUpdate::delta("depthUpdate", Vec::new()).with_sequence(Some(first), Some(last))
    }

    #[test]
    fn test_first_update_always_applies() {
        let tracker = SequenceTracker::new(SequencePolicy::Strict);
        assert_eq!(tracker.check(&update(500, 510)), SequenceCheck::Apply);
    }

    #[test]
    fn test_contiguous_and_overlapping_apply() {
        let mut tracker = SequenceTracker::new(SequencePolicy::Strict);
        tracker.record(&update(1, 10));
        assert_eq!(tracker.check(&update(11, 15)), SequenceCheck::Apply);
        // Straddles the baseline, as the first event after a REST snapshot does
        assert_eq!(tracker.check(&update(5, 15)), SequenceCheck::Apply);
    }

    #[test]
    fn test_stale_update() {
        let mut tracker = SequenceTracker::new(SequencePolicy::Strict);
        tracker.record(&update(1, 10));
        assert_eq!(
            tracker.check(&update(8, 10)),
            SequenceCheck::Stale {
                last: 10,
                received: 10
            }
        );
    }

    #[test]
    fn test_gap_detected() {
        let mut tracker = SequenceTracker::new(SequencePolicy::Strict);
        tracker.record(&update(1, 10));
        assert_eq!(
            tracker.check(&update(13, 20)),
            SequenceCheck::Gap {
                expected: 11,
                received: 13
            }
        );
    }

    #[test]
    fn test_offsets_without_first_id_only_check_staleness() {
        let mut tracker = SequenceTracker::new(SequencePolicy::Strict);
        tracker.record(&update(1, 10));
        let jump = DepthUpdate::delta("update", Vec::new()).with_sequence(None, Some(30));
        assert_eq!(tracker.check(&jump), SequenceCheck::Apply);
        let old = DepthUpdate::delta("update", Vec::new()).with_sequence(None, Some(9));
        assert!(matches!(tracker.check(&old), SequenceCheck::Stale { .. }));
    }

    #[test]
    fn test_trust_accepts_everything() {
        let mut tracker = SequenceTracker::new(SequencePolicy::Trust);
        tracker.record(&update(1, 10));
        assert_eq!(tracker.check(&update(2, 3)), SequenceCheck::Apply);
        assert_eq!(tracker.check(&update(50, 60)), SequenceCheck::Apply);
        tracker.record(&update(2, 3));
        assert_eq!(tracker.last(), Some(3));
    }

    #[test]
    fn test_snapshot_update_bypasses_checks() {
        let mut tracker = SequenceTracker::new(SequencePolicy::Strict);
        tracker.record(&update(1, 10));
        let snapshot = DepthUpdate::snapshot("snapshot", Vec::new()).with_sequence(None, Some(5));
        assert_eq!(tracker.check(&snapshot), SequenceCheck::Apply);
    }

    #[test]
    fn test_updates_without_ids_apply() {
        let mut tracker = SequenceTracker::new(SequencePolicy::Strict);
        tracker.record(&update(1, 10));
        let bare = DepthUpdate::delta("update", Vec::new());
        assert_eq!(tracker.check(&bare), SequenceCheck::Apply);
        tracker.record(&bare);
        assert_eq!(tracker.last(), Some(10));
        tracker.reset();
        assert_eq!(tracker.last(), None);
    }
}
