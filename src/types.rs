use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Activities
// =============================================================================

/// Lifecycle status of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    #[default]
    Planned,
    Done,
    Skipped,
    Cancelled,
}

impl ActivityStatus {
    /// Statuses the scheduler still acts on.
    pub fn is_actionable(&self) -> bool {
        matches!(self, ActivityStatus::Planned)
    }
}

/// Cadence unit for custom repeat rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatUnit {
    Days,
    Weeks,
    Months,
    Years,
}

/// How often an activity recurs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind")]
pub enum RepeatRule {
    Daily,
    Weekly,
    Weekdays,
    Monthly,
    Yearly,
    Custom { interval: u32, unit: RepeatUnit },
}

/// A user task — the unit being scheduled.
///
/// `scheduled_at` is an absolute instant; `scheduled_date` means "anytime
/// that day". After a successful apply both `scheduled_at` and
/// `calendar_id` are set; undo restores both to their prior values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub status: ActivityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_rule: Option<RepeatRule>,
    /// 1 = starred/highest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    /// Stable once inferred — never overwritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_domain: Option<Domain>,
    /// Last calendar this activity was scheduled on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_id: Option<String>,
}

impl Activity {
    /// Minimal constructor; optional fields start empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status: ActivityStatus::Planned,
            goal_id: None,
            goal_title: None,
            created_at: None,
            updated_at: None,
            scheduled_at: None,
            scheduled_date: None,
            reminder_at: None,
            estimate_minutes: None,
            repeat_rule: None,
            priority: None,
            scheduling_domain: None,
            calendar_id: None,
        }
    }

    pub fn is_starred(&self) -> bool {
        self.priority == Some(1)
    }
}

// =============================================================================
// Scheduling domains
// =============================================================================

/// Coarse semantic tag used to pick a preferred target calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Work,
    Health,
    Personal,
    Learning,
    Social,
    Errands,
}

impl Domain {
    pub const ALL: &'static [Domain] = &[
        Domain::Work,
        Domain::Health,
        Domain::Personal,
        Domain::Learning,
        Domain::Social,
        Domain::Errands,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Work => "work",
            Domain::Health => "health",
            Domain::Personal => "personal",
            Domain::Learning => "learning",
            Domain::Social => "social",
            Domain::Errands => "errands",
        }
    }

    /// Parse a storage/wire label. Unknown labels map to None so a bad
    /// classifier response degrades to "no signal".
    pub fn parse(label: &str) -> Option<Domain> {
        match label.trim().to_lowercase().as_str() {
            "work" => Some(Domain::Work),
            "health" => Some(Domain::Health),
            "personal" => Some(Domain::Personal),
            "learning" => Some(Domain::Learning),
            "social" => Some(Domain::Social),
            "errands" => Some(Domain::Errands),
            _ => None,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Calendars and events
// =============================================================================

/// A calendar the user can write to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calendar {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub writable: bool,
}

/// A normalized event fetched from a calendar provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub calendar_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Payload for creating a calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCalendarEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub calendar_id: String,
}

/// A time range already occupied on some calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// True when the half-open ranges [start, end) intersect.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

// =============================================================================
// Proposals and the undo journal
// =============================================================================

/// An ephemeral, user-reviewable suggested placement. Not persisted until
/// applied. Invariant: `start < end`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleProposal {
    pub activity_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub calendar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
}

impl ScheduleProposal {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// One reversible item inside an [`ApplyRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedItem {
    pub activity_id: String,
    pub calendar_id: String,
    pub event_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_calendar_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
}

/// The single most-recent apply's reversal record. Superseded by the next
/// apply; cleared by a successful undo.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRecord {
    /// Identity of this batch, quoted in logs and undo diagnostics.
    pub id: Uuid,
    /// Milliseconds since the Unix epoch at apply completion.
    pub applied_at_ms: i64,
    pub items: Vec<AppliedItem>,
    /// Whether the domain→calendar mapping merge ran for this batch.
    pub domain_mapping_applied: bool,
}

// =============================================================================
// User profile
// =============================================================================

fn default_timezone() -> Tz {
    chrono_tz::UTC
}

/// Persistent user preferences consumed by the scheduler.
///
/// `domain_calendar_map` is merged (never replaced) and only written at
/// apply time, never during interactive preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_calendar_id: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default)]
    pub domain_calendar_map: HashMap<Domain, String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            default_calendar_id: None,
            timezone: default_timezone(),
            domain_calendar_map: HashMap::new(),
        }
    }
}

impl UserProfile {
    /// Preferred calendar for a domain, if one has been learned.
    pub fn calendar_for(&self, domain: Option<Domain>) -> Option<&str> {
        domain
            .and_then(|d| self.domain_calendar_map.get(&d))
            .map(String::as_str)
    }
}
