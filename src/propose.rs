//! Greedy schedule proposal.
//!
//! A pure function over activities, the user profile, and the busy index:
//! no I/O, no mutation, safe to re-run whenever any input changes. Each
//! activity is placed independently in input order by walking forward in
//! fixed steps from the next slot inside its domain's preferred local
//! hours, accepting the first interval free of busy overlap.
//!
//! Intervals placed earlier in the batch are NOT fed back into the busy
//! set, so two proposals from the same run can collide. That is surfaced
//! through [`batch_collisions`] for user review rather than hidden by
//! silently shifting later activities.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use log::debug;

use crate::busy::BusyIndex;
use crate::types::{Activity, Domain, ScheduleProposal, UserProfile};

/// Candidate slots advance in steps of this many minutes.
pub const SLOT_STEP_MINUTES: i64 = 15;

/// Duration floor when an activity has no usable estimate.
pub const MIN_DURATION_MINUTES: i64 = 30;

/// Give up on an activity after walking this far ahead.
pub const SEARCH_HORIZON_DAYS: i64 = 14;

/// Preferred local placement hours per domain (start hour, end hour).
fn preferred_hours(domain: Option<Domain>) -> (u32, u32) {
    match domain {
        Some(Domain::Work) => (9, 18),
        Some(Domain::Health) => (6, 21),
        Some(Domain::Learning) | Some(Domain::Social) => (17, 22),
        Some(Domain::Errands) => (10, 19),
        Some(Domain::Personal) | None => (9, 20),
    }
}

/// Propose placements for a batch of unscheduled activities.
///
/// Activities are skipped (omitted from the result, never an error) when
/// they are already scheduled, no target calendar can be determined, or
/// no free slot exists within the search horizon. Callers compare counts
/// to report omissions.
pub fn propose(
    activities: &[Activity],
    profile: &UserProfile,
    default_calendar_id: Option<&str>,
    busy: &BusyIndex,
    now: DateTime<Utc>,
) -> Vec<ScheduleProposal> {
    let mut proposals = Vec::with_capacity(activities.len());

    for activity in activities {
        if activity.scheduled_at.is_some() || !activity.status.is_actionable() {
            continue;
        }

        let domain = activity.scheduling_domain;
        let Some(calendar_id) = profile.calendar_for(domain).or(default_calendar_id) else {
            debug!("no target calendar for '{}', omitting", activity.title);
            continue;
        };

        let duration = match activity.estimate_minutes {
            Some(m) if m > 0 => m,
            _ => MIN_DURATION_MINUTES,
        };

        match find_slot(
            busy.busy_for(calendar_id),
            profile.timezone,
            preferred_hours(domain),
            Duration::minutes(duration),
            now,
        ) {
            Some((start, end)) => proposals.push(ScheduleProposal {
                activity_id: activity.id.clone(),
                title: activity.title.clone(),
                start,
                end,
                calendar_id: calendar_id.to_string(),
                domain,
            }),
            None => {
                debug!(
                    "no free {duration}-minute slot for '{}' within {SEARCH_HORIZON_DAYS} days",
                    activity.title
                );
            }
        }
    }

    proposals
}

/// Same-run proposal pairs that overlap on the same calendar. Returned as
/// `(activity_id_a, activity_id_b)` in input order.
pub fn batch_collisions(proposals: &[ScheduleProposal]) -> Vec<(String, String)> {
    let mut collisions = Vec::new();
    for (i, a) in proposals.iter().enumerate() {
        for b in proposals.iter().skip(i + 1) {
            if a.calendar_id == b.calendar_id && a.start < b.end && b.start < a.end {
                collisions.push((a.activity_id.clone(), b.activity_id.clone()));
            }
        }
    }
    collisions
}

/// Walk forward from `now`, day by day, testing step-aligned candidate
/// intervals inside the preferred window until one clears the busy set.
fn find_slot(
    busy: &[crate::types::BusyInterval],
    tz: Tz,
    (open_hour, close_hour): (u32, u32),
    duration: Duration,
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let local_now = ceil_to_step(now.with_timezone(&tz));
    let step = Duration::minutes(SLOT_STEP_MINUTES);

    for day_offset in 0..=SEARCH_HORIZON_DAYS {
        let date = local_now.date_naive() + Duration::days(day_offset);
        let Some(window_start) = local_time(date, open_hour, tz) else {
            continue;
        };
        let Some(window_end) = local_time(date, close_hour, tz) else {
            continue;
        };

        let mut slot = if day_offset == 0 && local_now > window_start {
            local_now
        } else {
            window_start
        };

        while slot + duration <= window_end {
            let start = slot.with_timezone(&Utc);
            let end = (slot + duration).with_timezone(&Utc);
            if !busy.iter().any(|b| b.overlaps(start, end)) {
                return Some((start, end));
            }
            slot += step;
        }
    }

    None
}

/// Round a local time up to the next slot boundary.
fn ceil_to_step(dt: DateTime<Tz>) -> DateTime<Tz> {
    let floored = dt
        .with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
        - Duration::minutes((dt.minute() % SLOT_STEP_MINUTES as u32) as i64);
    if floored == dt {
        dt
    } else {
        floored + Duration::minutes(SLOT_STEP_MINUTES)
    }
}

/// Resolve a local wall-clock hour on a date, skipping times that don't
/// exist (DST gap); ambiguous times take the earlier instant.
fn local_time(date: NaiveDate, hour: u32, tz: Tz) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(first, _) => Some(first),
        LocalResult::None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::busy::BusyIndex;
    use crate::types::{ActivityStatus, CalendarEvent};

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
    }

    fn profile_utc(default: Option<&str>) -> UserProfile {
        UserProfile {
            default_calendar_id: default.map(str::to_string),
            timezone: chrono_tz::UTC,
            ..Default::default()
        }
    }

    fn activity(id: &str, estimate: Option<i64>) -> Activity {
        let mut a = Activity::new(id, format!("Activity {id}"));
        a.estimate_minutes = estimate;
        a
    }

    fn busy_on(cal: &str, intervals: &[(DateTime<Utc>, DateTime<Utc>)]) -> BusyIndex {
        let events: Vec<CalendarEvent> = intervals
            .iter()
            .enumerate()
            .map(|(i, (start, end))| CalendarEvent {
                id: format!("e{i}"),
                calendar_id: cal.to_string(),
                title: "busy".to_string(),
                start: *start,
                end: *end,
            })
            .collect();
        BusyIndex::from_events(&events)
    }

    #[test]
    fn places_at_window_open_when_free() {
        let profile = profile_utc(None);
        let now = at(2, 3, 0); // 3 AM, before the 9 AM window
        let proposals = propose(
            &[activity("a1", Some(60))],
            &profile,
            Some("cal"),
            &BusyIndex::default(),
            now,
        );

        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].start, at(2, 9, 0));
        assert_eq!(proposals[0].end, at(2, 10, 0));
        assert_eq!(proposals[0].calendar_id, "cal");
    }

    #[test]
    fn duration_floor_applies_when_estimate_missing_or_zero() {
        let profile = profile_utc(None);
        let now = at(2, 3, 0);
        let proposals = propose(
            &[activity("a1", None), activity("a2", Some(0))],
            &profile,
            Some("cal"),
            &BusyIndex::default(),
            now,
        );

        assert_eq!(proposals.len(), 2);
        for p in &proposals {
            assert!(p.start < p.end);
            assert_eq!(p.duration_minutes(), MIN_DURATION_MINUTES);
        }
    }

    #[test]
    fn short_estimates_are_not_padded() {
        let profile = profile_utc(None);
        let proposals = propose(
            &[activity("a1", Some(15))],
            &profile,
            Some("cal"),
            &BusyIndex::default(),
            at(2, 3, 0),
        );
        assert_eq!(proposals[0].duration_minutes(), 15);
    }

    #[test]
    fn walks_past_busy_intervals() {
        let profile = profile_utc(None);
        let busy = busy_on("cal", &[(at(2, 9, 0), at(2, 10, 30))]);
        let proposals = propose(
            &[activity("a1", Some(60))],
            &profile,
            Some("cal"),
            &busy,
            at(2, 3, 0),
        );

        assert_eq!(proposals[0].start, at(2, 10, 30));
    }

    #[test]
    fn domain_mapping_overrides_default_calendar() {
        let mut profile = profile_utc(Some("default-cal"));
        profile
            .domain_calendar_map
            .insert(Domain::Health, "health-cal".to_string());

        let mut a = activity("a1", Some(30));
        a.scheduling_domain = Some(Domain::Health);

        let proposals = propose(&[a], &profile, Some("default-cal"), &BusyIndex::default(), at(2, 3, 0));
        assert_eq!(proposals[0].calendar_id, "health-cal");
        assert_eq!(proposals[0].domain, Some(Domain::Health));
    }

    #[test]
    fn no_calendars_means_empty_proposals() {
        let profile = profile_utc(None);
        let proposals = propose(
            &[activity("a1", Some(30)), activity("a2", None)],
            &profile,
            None,
            &BusyIndex::default(),
            at(2, 3, 0),
        );
        assert!(proposals.is_empty());
    }

    #[test]
    fn oversized_activity_is_omitted_not_an_error() {
        let profile = profile_utc(None);
        // 12 hours never fits the 9:00–20:00 default window
        let proposals = propose(
            &[activity("a1", Some(12 * 60)), activity("a2", Some(30))],
            &profile,
            Some("cal"),
            &BusyIndex::default(),
            at(2, 3, 0),
        );
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].activity_id, "a2");
    }

    #[test]
    fn already_scheduled_and_finished_activities_are_skipped() {
        let profile = profile_utc(None);
        let mut scheduled = activity("a1", Some(30));
        scheduled.scheduled_at = Some(at(1, 10, 0));
        let mut done = activity("a2", Some(30));
        done.status = ActivityStatus::Done;

        let proposals = propose(
            &[scheduled, done],
            &profile,
            Some("cal"),
            &BusyIndex::default(),
            at(2, 3, 0),
        );
        assert!(proposals.is_empty());
    }

    #[test]
    fn same_batch_collisions_are_surfaced_not_avoided() {
        let profile = profile_utc(None);
        let proposals = propose(
            &[activity("a1", Some(60)), activity("a2", Some(60))],
            &profile,
            Some("cal"),
            &BusyIndex::default(),
            at(2, 3, 0),
        );

        // Both land on the same first free slot — the known greedy gap.
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].start, proposals[1].start);

        let collisions = batch_collisions(&proposals);
        assert_eq!(collisions, vec![("a1".to_string(), "a2".to_string())]);
    }

    #[test]
    fn evening_domain_anchors_after_work_hours() {
        let profile = profile_utc(None);
        let mut a = activity("a1", Some(45));
        a.scheduling_domain = Some(Domain::Learning);

        let proposals = propose(&[a], &profile, Some("cal"), &BusyIndex::default(), at(2, 3, 0));
        assert_eq!(proposals[0].start, at(2, 17, 0));
    }

    #[test]
    fn anchors_respect_profile_timezone() {
        let mut profile = profile_utc(None);
        profile.timezone = chrono_tz::America::New_York;

        // Midnight UTC on Mar 2 is 7 PM Mar 1 in New York; the first
        // in-window work slot is Mar 2, 9 AM EST = 14:00 UTC.
        let mut a = activity("a1", Some(30));
        a.scheduling_domain = Some(Domain::Work);
        let proposals = propose(&[a], &profile, Some("cal"), &BusyIndex::default(), at(2, 0, 0));

        assert_eq!(proposals[0].start, at(2, 14, 0));
    }

    #[test]
    fn mid_day_start_rounds_up_to_step() {
        let profile = profile_utc(None);
        let proposals = propose(
            &[activity("a1", Some(30))],
            &profile,
            Some("cal"),
            &BusyIndex::default(),
            at(2, 10, 7),
        );
        assert_eq!(proposals[0].start, at(2, 10, 15));
    }

    #[test]
    fn fully_booked_horizon_omits_the_activity() {
        let profile = profile_utc(None);
        // One busy block covering every daytime hour of the horizon.
        let busy = busy_on("cal", &[(at(1, 0, 0), at(31, 0, 0))]);
        let proposals = propose(
            &[activity("a1", Some(30))],
            &profile,
            Some("cal"),
            &busy,
            at(2, 3, 0),
        );
        assert!(proposals.is_empty());
    }
}
