//! Busy-interval aggregation.
//!
//! Fetches events from the requested calendars over a window, normalizes
//! them into `{start, end}` intervals, and builds a per-calendar index
//! plus a coalesced global union under [`ALL_CALENDARS`]. One calendar
//! failing must not abort the others — partial results are logged and
//! returned.
//!
//! No cross-calendar deduplication: the same meeting mirrored onto two
//! calendars counts as busy time twice, which only ever makes the
//! proposer more conservative.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, warn};

use crate::ports::CalendarService;
use crate::types::{BusyInterval, CalendarEvent};

/// Reserved index key holding the union across all fetched calendars.
pub const ALL_CALENDARS: &str = "__all__";

/// Fan-out cap per aggregation pass.
pub const MAX_CALENDARS: usize = 20;

/// Sorted, coalesced busy intervals per calendar id, plus the global
/// union under [`ALL_CALENDARS`].
#[derive(Debug, Clone, Default)]
pub struct BusyIndex {
    by_calendar: HashMap<String, Vec<BusyInterval>>,
}

impl BusyIndex {
    /// Busy intervals for one calendar. Falls back to the global union
    /// when the calendar has no loaded data, which keeps placement
    /// conservative rather than optimistic.
    pub fn busy_for(&self, calendar_id: &str) -> &[BusyInterval] {
        match self.by_calendar.get(calendar_id) {
            Some(intervals) => intervals,
            None => self.all(),
        }
    }

    /// The coalesced union across every fetched calendar.
    pub fn all(&self) -> &[BusyInterval] {
        self.by_calendar
            .get(ALL_CALENDARS)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn calendars(&self) -> impl Iterator<Item = &str> {
        self.by_calendar
            .keys()
            .map(String::as_str)
            .filter(|k| *k != ALL_CALENDARS)
    }

    pub fn is_empty(&self) -> bool {
        self.all().is_empty()
    }

    /// Build an index from already-normalized events. Used directly by
    /// tests and by callers that fetch through other means.
    pub fn from_events(events: &[CalendarEvent]) -> Self {
        let mut grouped: HashMap<String, Vec<BusyInterval>> = HashMap::new();
        let mut union = Vec::new();

        for event in events {
            // Discard malformed entries rather than propagating them.
            if event.id.is_empty() || event.calendar_id.is_empty() || event.end <= event.start {
                debug!("discarding malformed event {:?}", event.id);
                continue;
            }
            let interval = BusyInterval::new(event.start, event.end);
            grouped
                .entry(event.calendar_id.clone())
                .or_default()
                .push(interval);
            union.push(interval);
        }

        let mut by_calendar: HashMap<String, Vec<BusyInterval>> = grouped
            .into_iter()
            .map(|(id, intervals)| (id, coalesce(intervals)))
            .collect();
        by_calendar.insert(ALL_CALENDARS.to_string(), coalesce(union));

        Self { by_calendar }
    }
}

/// Sort ascending by start and merge overlapping or touching neighbors.
pub fn coalesce(mut intervals: Vec<BusyInterval>) -> Vec<BusyInterval> {
    if intervals.len() < 2 {
        return intervals;
    }
    intervals.sort_by_key(|i| (i.start, i.end));

    let mut merged: Vec<BusyInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                if interval.end > last.end {
                    last.end = interval.end;
                }
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Fetch busy intervals for `calendar_ids` over `[start, end)`.
///
/// Per-calendar fetches run concurrently (fan-out, then fan-in); a
/// failure on one calendar is logged and skipped. The request list is
/// capped at [`MAX_CALENDARS`].
pub async fn load_busy(
    service: &dyn CalendarService,
    calendar_ids: &[String],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> BusyIndex {
    if calendar_ids.len() > MAX_CALENDARS {
        warn!(
            "busy fetch requested for {} calendars, capping at {MAX_CALENDARS}",
            calendar_ids.len()
        );
    }
    let ids: Vec<&String> = calendar_ids.iter().take(MAX_CALENDARS).collect();

    let fetches = ids
        .iter()
        .map(|id| async move { (id.as_str(), service.list_events(id, start, end).await) });
    let results = join_all(fetches).await;

    let mut events = Vec::new();
    for (calendar_id, result) in results {
        match result {
            Ok(mut fetched) => {
                // Normalize: events land under the calendar they were
                // requested for, whatever the provider reported.
                for event in fetched.iter_mut() {
                    event.calendar_id = calendar_id.to_string();
                }
                events.extend(fetched);
            }
            Err(e) => {
                warn!("busy fetch failed for calendar {calendar_id}: {e}");
            }
        }
    }

    BusyIndex::from_events(&events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScheduleError;
    use crate::types::{Calendar, NewCalendarEvent};
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn event(id: &str, cal: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            calendar_id: cal.to_string(),
            title: "busy".to_string(),
            start,
            end,
        }
    }

    /// Calendar stub: `cal-bad` always fails, everything else returns one
    /// fixed event per calendar.
    struct FlakyCalendar;

    #[async_trait]
    impl CalendarService for FlakyCalendar {
        async fn list_writable_calendars(&self) -> Result<Vec<Calendar>, ScheduleError> {
            Ok(Vec::new())
        }

        async fn default_calendar_id(&self) -> Result<Option<String>, ScheduleError> {
            Ok(None)
        }

        async fn list_events(
            &self,
            calendar_id: &str,
            start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>, ScheduleError> {
            if calendar_id == "cal-bad" {
                return Err(ScheduleError::Calendar("503".into()));
            }
            Ok(vec![event(
                &format!("{calendar_id}-e1"),
                calendar_id,
                start,
                start + chrono::Duration::minutes(30),
            )])
        }

        async fn create_event(&self, _event: &NewCalendarEvent) -> Result<String, ScheduleError> {
            unimplemented!("not used by aggregation tests")
        }

        async fn delete_event(
            &self,
            _calendar_id: &str,
            _event_id: &str,
        ) -> Result<(), ScheduleError> {
            unimplemented!("not used by aggregation tests")
        }
    }

    #[test]
    fn coalesce_merges_overlapping_and_touching() {
        let merged = coalesce(vec![
            BusyInterval::new(at(13, 0), at(14, 0)),
            BusyInterval::new(at(9, 0), at(10, 0)),
            BusyInterval::new(at(9, 30), at(10, 30)),
            BusyInterval::new(at(10, 30), at(11, 0)), // touching
        ]);

        assert_eq!(
            merged,
            vec![
                BusyInterval::new(at(9, 0), at(11, 0)),
                BusyInterval::new(at(13, 0), at(14, 0)),
            ]
        );
    }

    #[test]
    fn union_is_sorted_and_disjoint() {
        let events = vec![
            event("e1", "cal-a", at(10, 0), at(11, 0)),
            event("e2", "cal-b", at(10, 30), at(11, 30)),
            event("e3", "cal-a", at(9, 0), at(9, 15)),
        ];
        let index = BusyIndex::from_events(&events);

        let all = index.all();
        for pair in all.windows(2) {
            assert!(pair[0].end < pair[1].start, "intervals overlap or touch");
        }
        assert_eq!(all.len(), 2);
        assert_eq!(index.busy_for("cal-a").len(), 2);
        assert_eq!(index.busy_for("cal-b").len(), 1);
    }

    #[test]
    fn malformed_events_are_discarded() {
        let events = vec![
            event("", "cal-a", at(9, 0), at(10, 0)),
            event("e1", "cal-a", at(10, 0), at(10, 0)), // zero length
            event("e2", "cal-a", at(11, 0), at(10, 0)), // inverted
            event("e3", "cal-a", at(12, 0), at(13, 0)),
        ];
        let index = BusyIndex::from_events(&events);
        assert_eq!(index.busy_for("cal-a").len(), 1);
        assert_eq!(index.all().len(), 1);
    }

    #[test]
    fn unknown_calendar_falls_back_to_union() {
        let events = vec![event("e1", "cal-a", at(9, 0), at(10, 0))];
        let index = BusyIndex::from_events(&events);
        assert_eq!(index.busy_for("cal-unseen"), index.all());
    }

    #[tokio::test]
    async fn one_failing_calendar_yields_partial_results() {
        let _ = env_logger::builder().is_test(true).try_init();
        let service = FlakyCalendar;
        let ids = vec![
            "cal-a".to_string(),
            "cal-bad".to_string(),
            "cal-b".to_string(),
        ];

        let index = load_busy(&service, &ids, at(9, 0), at(18, 0)).await;

        assert_eq!(index.busy_for("cal-a").len(), 1);
        assert_eq!(index.busy_for("cal-b").len(), 1);
        // cal-bad contributed nothing; lookups fall back to the union
        assert_eq!(index.calendars().count(), 2);
    }

    #[tokio::test]
    async fn fan_out_is_capped() {
        let service = FlakyCalendar;
        let ids: Vec<String> = (0..30).map(|i| format!("cal-{i}")).collect();

        let index = load_busy(&service, &ids, at(9, 0), at(18, 0)).await;
        assert_eq!(index.calendars().count(), MAX_CALENDARS);
    }
}
