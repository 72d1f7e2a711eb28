//! Per-session mutable state.
//!
//! One `SchedulingSession` is created when the user enters the scheduling
//! flow and dropped on teardown. It owns the pieces of state the flow
//! mutates outside the activity list: the single-slot undo journal, the
//! cancellation flag the domain-inference batch polls between iterations,
//! and the session-wide remote-lookup budget. Constructor-injected on
//! purpose — no module-scope singletons.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::types::ApplyRecord;

#[derive(Debug, Default)]
pub struct SchedulingSession {
    journal: Mutex<Option<ApplyRecord>>,
    cancelled: AtomicBool,
    remote_lookups: AtomicUsize,
}

impl SchedulingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of in-flight best-effort work. Already
    /// dispatched network calls are not aborted; their results are
    /// discarded on resolution.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Reserve one remote classification slot against `budget`. Returns
    /// false once the session has spent its budget; the count never
    /// resets, so repeated inference passes share one allowance.
    pub fn try_reserve_remote_lookup(&self, budget: usize) -> bool {
        self.remote_lookups
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                (used < budget).then_some(used + 1)
            })
            .is_ok()
    }

    pub fn remote_lookups_used(&self) -> usize {
        self.remote_lookups.load(Ordering::Relaxed)
    }

    /// Snapshot of the current journal slot.
    pub fn journal(&self) -> Option<ApplyRecord> {
        self.journal.lock().clone()
    }

    /// Overwrite the journal slot. The previous record, if unconsumed, is
    /// lost — only the most recent apply is reversible.
    pub fn replace_journal(&self, record: ApplyRecord) {
        *self.journal.lock() = Some(record);
    }

    /// Take the journal out of the slot, clearing it.
    pub fn take_journal(&self) -> Option<ApplyRecord> {
        self.journal.lock().take()
    }

    pub fn clear_journal(&self) {
        *self.journal.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ms: i64) -> ApplyRecord {
        ApplyRecord {
            id: uuid::Uuid::new_v4(),
            applied_at_ms: ms,
            items: Vec::new(),
            domain_mapping_applied: false,
        }
    }

    #[test]
    fn journal_slot_is_single_and_overwritten() {
        let session = SchedulingSession::new();
        assert!(session.journal().is_none());

        session.replace_journal(record(1));
        session.replace_journal(record(2));
        assert_eq!(session.journal().map(|r| r.applied_at_ms), Some(2));

        assert_eq!(session.take_journal().map(|r| r.applied_at_ms), Some(2));
        assert!(session.journal().is_none());
    }

    #[test]
    fn remote_budget_is_spent_once() {
        let session = SchedulingSession::new();
        for _ in 0..3 {
            assert!(session.try_reserve_remote_lookup(3));
        }
        assert!(!session.try_reserve_remote_lookup(3));
        assert_eq!(session.remote_lookups_used(), 3);
    }

    #[test]
    fn cancellation_is_sticky() {
        let session = SchedulingSession::new();
        assert!(!session.is_cancelled());
        session.cancel();
        assert!(session.is_cancelled());
        session.cancel();
        assert!(session.is_cancelled());
    }
}
