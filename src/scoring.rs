//! Activity recommendation scoring.
//!
//! Pure functions of a single activity plus "now". Each axis yields a
//! score in [0, 1]; the blended recommendation score uses fixed weights
//! and a status multiplier. Malformed or missing inputs degrade to "no
//! signal" — nothing in this module errors.

use chrono::{DateTime, Utc};

use crate::types::{Activity, ActivityStatus, RepeatRule, RepeatUnit};

const WEIGHT_RECENCY: f64 = 0.30;
const WEIGHT_FREQUENCY: f64 = 0.20;
const WEIGHT_STARRED: f64 = 0.25;
const WEIGHT_PRIORITY: f64 = 0.15;
const WEIGHT_DUE_SOON: f64 = 0.10;

/// Step function on days since the activity last changed.
/// Falls back to `created_at`; 0.0 when neither is present.
pub fn recency_score(activity: &Activity, now: DateTime<Utc>) -> f64 {
    let reference = activity.updated_at.or(activity.created_at);
    let Some(touched) = reference else {
        return 0.0;
    };

    let days = (now - touched).num_seconds() as f64 / 86_400.0;
    if days <= 3.0 {
        1.0
    } else if days <= 7.0 {
        0.8
    } else if days <= 14.0 {
        0.6
    } else if days <= 30.0 {
        0.4
    } else {
        0.2
    }
}

/// Constant per repeat-rule tag; custom cadences scale the unit base
/// inversely with the interval, capped at 1.0.
pub fn frequency_score(activity: &Activity) -> f64 {
    let Some(rule) = activity.repeat_rule else {
        return 0.0;
    };

    match rule {
        RepeatRule::Daily => 1.0,
        RepeatRule::Weekdays => 0.9,
        RepeatRule::Weekly => 0.7,
        RepeatRule::Monthly => 0.4,
        RepeatRule::Yearly => 0.2,
        RepeatRule::Custom { interval, unit } => {
            let base = match unit {
                RepeatUnit::Days => 1.0,
                RepeatUnit::Weeks => 0.7,
                RepeatUnit::Months => 0.4,
                RepeatUnit::Years => 0.2,
            };
            let interval = interval.max(1) as f64;
            (base / interval).min(1.0)
        }
    }
}

/// Step function on days until the due signal (`scheduled_date`, else
/// `reminder_at`). 0.0 with no signal; overdue counts as due now.
pub fn due_soon_score(activity: &Activity, now: DateTime<Utc>) -> f64 {
    let due = activity
        .scheduled_date
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .or(activity.reminder_at);

    let Some(due) = due else {
        return 0.0;
    };

    let days = (due - now).num_seconds() as f64 / 86_400.0;
    if days <= 0.5 {
        1.0
    } else if days <= 3.0 {
        0.7
    } else if days <= 7.0 {
        0.4
    } else {
        0.1
    }
}

/// 1.0 when starred (priority 1), else 0.0.
pub fn starred_score(activity: &Activity) -> f64 {
    if activity.is_starred() {
        1.0
    } else {
        0.0
    }
}

/// Graded by priority level; unset priority contributes nothing.
pub fn priority_score(activity: &Activity) -> f64 {
    match activity.priority {
        Some(1) => 1.0,
        Some(2) => 0.6,
        Some(3) => 0.3,
        Some(_) => 0.1,
        None => 0.0,
    }
}

/// Actionable statuses score at full weight; finished or abandoned
/// activities are damped, not excluded.
pub fn status_multiplier(status: ActivityStatus) -> f64 {
    match status {
        ActivityStatus::Planned => 1.0,
        ActivityStatus::Done => 0.4,
        ActivityStatus::Skipped | ActivityStatus::Cancelled => 0.2,
    }
}

/// Blended [0, 1] recommendation score. Weights are design constants.
pub fn recommendation_score(activity: &Activity, now: DateTime<Utc>) -> f64 {
    let blended = WEIGHT_RECENCY * recency_score(activity, now)
        + WEIGHT_FREQUENCY * frequency_score(activity)
        + WEIGHT_STARRED * starred_score(activity)
        + WEIGHT_PRIORITY * priority_score(activity)
        + WEIGHT_DUE_SOON * due_soon_score(activity, now);

    blended * status_multiplier(activity.status)
}
