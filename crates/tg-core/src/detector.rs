//! Change Detection
//!
//! Two observers feed the engine: the content observer (whole document,
//! subtree) triggers full apply passes, the popup observer triggers popup
//! dismissal only. A fixed-interval one-shot tick, re-armed on every expiry,
//! catches anything the observers miss.

use crate::dom::{self, Scheduler};
use crate::types::TimerId;

/// Which observer reported a mutation batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserverKind {
    Content,
    Popup,
}

/// Counters for what has driven the engine so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorStats {
    pub mutation_batches: u64,
    pub popup_batches: u64,
    pub ticks: u64,
}

#[derive(Debug)]
pub struct ChangeDetector {
    interval_ms: u64,
    tick: Option<TimerId>,
    stats: DetectorStats,
}

impl ChangeDetector {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            tick: None,
            stats: DetectorStats::default(),
        }
    }

    /// Arm (or re-arm) the fallback tick.
    pub fn arm<S: Scheduler>(&mut self, scheduler: &mut S) {
        dom::rearm(scheduler, &mut self.tick, self.interval_ms);
    }

    pub fn disarm<S: Scheduler>(&mut self, scheduler: &mut S) {
        dom::cancel(scheduler, &mut self.tick);
    }

    pub fn is_armed(&self) -> bool {
        self.tick.is_some()
    }

    /// Is `id` the fallback tick? If so, it is re-armed.
    pub fn on_timer<S: Scheduler>(&mut self, scheduler: &mut S, id: TimerId) -> bool {
        if !dom::claim(&mut self.tick, id) {
            return false;
        }
        self.stats.ticks += 1;
        self.arm(scheduler);
        true
    }

    /// Record a mutation batch. Returns true if it warrants work: batches
    /// with no added nodes are ignored.
    pub fn on_mutations(&mut self, kind: ObserverKind, added: usize) -> bool {
        if added == 0 {
            return false;
        }
        match kind {
            ObserverKind::Content => self.stats.mutation_batches += 1,
            ObserverKind::Popup => self.stats.popup_batches += 1,
        }
        true
    }

    pub fn stats(&self) -> DetectorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ManualScheduler;

    #[test]
    fn test_tick_rearms_on_expiry() {
        let mut scheduler = ManualScheduler::new();
        let mut detector = ChangeDetector::new(1000);
        detector.arm(&mut scheduler);

        let first = scheduler.pop_due(1000).unwrap();
        assert!(detector.on_timer(&mut scheduler, first));
        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(scheduler.next_due(), Some(2000));

        // The old id is stale now.
        assert!(!detector.on_timer(&mut scheduler, first));
        assert_eq!(detector.stats().ticks, 1);
    }

    #[test]
    fn test_disarm_cancels_tick() {
        let mut scheduler = ManualScheduler::new();
        let mut detector = ChangeDetector::new(500);
        detector.arm(&mut scheduler);
        detector.arm(&mut scheduler);
        assert_eq!(scheduler.pending_count(), 1);

        detector.disarm(&mut scheduler);
        assert!(!detector.is_armed());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_empty_batches_are_ignored() {
        let mut detector = ChangeDetector::new(1000);
        assert!(!detector.on_mutations(ObserverKind::Content, 0));
        assert!(detector.on_mutations(ObserverKind::Content, 3));
        assert!(detector.on_mutations(ObserverKind::Popup, 1));
        assert_eq!(
            detector.stats(),
            DetectorStats {
                mutation_batches: 1,
                popup_batches: 1,
                ticks: 0
            }
        );
    }
}
