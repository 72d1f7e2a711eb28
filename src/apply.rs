//! Apply/undo orchestration.
//!
//! Applying commits proposals as real calendar events. Items fail
//! independently: a create failure is logged and excluded from the
//! success count without aborting the rest of the batch. Each success
//! updates the activity's scheduling fields and appends a journal item
//! carrying enough prior state to reverse it.
//!
//! Undo is valid for two hours after an apply and restores local activity
//! state unconditionally — a failed calendar-side delete is logged but
//! never blocks the restore. Local consistency wins over calendar-side
//! consistency.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::ports::{CalendarService, ProfileStore};
use crate::session::SchedulingSession;
use crate::types::{
    Activity, AppliedItem, ApplyRecord, Domain, NewCalendarEvent, ScheduleProposal,
};

/// How long after an apply the undo journal stays eligible.
pub const UNDO_WINDOW_MINUTES: i64 = 120;

/// Result of an apply batch. `record` is `None` when nothing succeeded.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub success_count: usize,
    pub record: Option<ApplyRecord>,
}

pub struct ApplyOrchestrator {
    calendar: Arc<dyn CalendarService>,
    profile_store: Arc<dyn ProfileStore>,
    session: Arc<SchedulingSession>,
}

impl ApplyOrchestrator {
    pub fn new(
        calendar: Arc<dyn CalendarService>,
        profile_store: Arc<dyn ProfileStore>,
        session: Arc<SchedulingSession>,
    ) -> Self {
        Self {
            calendar,
            profile_store,
            session,
        }
    }

    /// Commit a batch of proposals. Proposals are processed sequentially
    /// in input order; the journal preserves that order for replay.
    pub async fn apply(
        &self,
        proposals: &[ScheduleProposal],
        activities: &mut [Activity],
        now: DateTime<Utc>,
    ) -> ApplyOutcome {
        let mut items: Vec<AppliedItem> = Vec::new();
        let mut touched_mappings: Vec<(Domain, String)> = Vec::new();

        for proposal in proposals {
            let Some(activity) = activities
                .iter_mut()
                .find(|a| a.id == proposal.activity_id)
            else {
                warn!(
                    "proposal references unknown activity {}, skipping",
                    proposal.activity_id
                );
                continue;
            };

            let event = NewCalendarEvent {
                title: proposal.title.clone(),
                start: proposal.start,
                end: proposal.end,
                calendar_id: proposal.calendar_id.clone(),
            };

            match self.calendar.create_event(&event).await {
                Ok(event_id) => {
                    items.push(AppliedItem {
                        activity_id: activity.id.clone(),
                        calendar_id: proposal.calendar_id.clone(),
                        event_id,
                        start: proposal.start,
                        end: proposal.end,
                        prev_scheduled_at: activity.scheduled_at,
                        prev_calendar_id: activity.calendar_id.clone(),
                        domain: proposal.domain,
                    });

                    // Keep the (scheduled_at, calendar_id) pair consistent.
                    activity.scheduled_at = Some(proposal.start);
                    activity.calendar_id = Some(proposal.calendar_id.clone());

                    if let Some(domain) = proposal.domain {
                        if !touched_mappings.iter().any(|(d, _)| *d == domain) {
                            touched_mappings.push((domain, proposal.calendar_id.clone()));
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "create_event failed for '{}' on {}: {e}",
                        proposal.title, proposal.calendar_id
                    );
                }
            }
        }

        let success_count = items.len();
        if success_count == 0 {
            return ApplyOutcome {
                success_count: 0,
                record: None,
            };
        }

        let domain_mapping_applied = if touched_mappings.is_empty() {
            false
        } else {
            match self.profile_store.merge_domain_mapping(&touched_mappings) {
                Ok(()) => true,
                Err(e) => {
                    warn!("failed to persist domain→calendar mapping: {e}");
                    false
                }
            }
        };

        let record = ApplyRecord {
            id: Uuid::new_v4(),
            applied_at_ms: now.timestamp_millis(),
            items,
            domain_mapping_applied,
        };
        // Overwrites any unconsumed previous record — only the most
        // recent apply is reversible.
        self.session.replace_journal(record.clone());

        info!(
            "applied {success_count}/{} proposals (journal {})",
            proposals.len(),
            record.id
        );
        ApplyOutcome {
            success_count,
            record: Some(record),
        }
    }

    /// Whether the journal holds a reversible batch at `now`.
    pub fn can_undo(&self, now: DateTime<Utc>) -> bool {
        match self.session.journal() {
            Some(record) => {
                !record.items.is_empty() && age_minutes(&record, now) < UNDO_WINDOW_MINUTES
            }
            None => false,
        }
    }

    /// Reverse the most recent apply. Calendar-side deletes are best
    /// effort; activity state is restored regardless, and the journal
    /// slot is cleared on completion.
    pub async fn undo(
        &self,
        activities: &mut [Activity],
        now: DateTime<Utc>,
    ) -> Result<usize, ScheduleError> {
        let Some(record) = self.session.journal() else {
            return Err(ScheduleError::NothingToUndo);
        };
        if record.items.is_empty() {
            return Err(ScheduleError::NothingToUndo);
        }

        let age = age_minutes(&record, now);
        if age >= UNDO_WINDOW_MINUTES {
            return Err(ScheduleError::UndoExpired(age));
        }

        let mut restored = 0;
        for item in &record.items {
            if let Err(e) = self
                .calendar
                .delete_event(&item.calendar_id, &item.event_id)
                .await
            {
                warn!(
                    "delete_event failed for {} on {}: {e} (restoring local state anyway)",
                    item.event_id, item.calendar_id
                );
            }

            if let Some(activity) = activities.iter_mut().find(|a| a.id == item.activity_id) {
                activity.scheduled_at = item.prev_scheduled_at;
                activity.calendar_id = item.prev_calendar_id.clone();
                restored += 1;
            } else {
                warn!("undo target activity {} no longer present", item.activity_id);
            }
        }

        self.session.clear_journal();
        info!("undid {restored}/{} applied items", record.items.len());
        Ok(restored)
    }
}

fn age_minutes(record: &ApplyRecord, now: DateTime<Utc>) -> i64 {
    (now.timestamp_millis() - record.applied_at_ms) / 60_000
}
