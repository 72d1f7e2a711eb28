//! Collaborator trait seams.
//!
//! The engine consumes three external collaborators: a calendar provider,
//! a text-classification proxy, and a user-profile store. Every method is
//! fallible and independently failing; callers decide which failures are
//! tolerated (logged, counted) versus structural.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ScheduleError;
use crate::types::{Calendar, CalendarEvent, Domain, NewCalendarEvent, UserProfile};

/// A device or cloud calendar provider.
#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn list_writable_calendars(&self) -> Result<Vec<Calendar>, ScheduleError>;

    async fn default_calendar_id(&self) -> Result<Option<String>, ScheduleError>;

    /// Events on one calendar within `[start, end)`.
    async fn list_events(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, ScheduleError>;

    /// Returns the id of the created event.
    async fn create_event(&self, event: &NewCalendarEvent) -> Result<String, ScheduleError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str)
        -> Result<(), ScheduleError>;
}

/// Single-turn text classifier mapping an activity title (plus optional
/// goal context) to a scheduling domain. Advisory only — callers must
/// treat any failure as "no signal".
#[async_trait]
pub trait DomainClassifier: Send + Sync {
    async fn classify(
        &self,
        title: &str,
        goal_title: Option<&str>,
    ) -> Result<Option<Domain>, ScheduleError>;
}

/// Opaque key-value store for the user profile. The domain→calendar
/// mapping is merged on save, never wholesale replaced.
pub trait ProfileStore: Send + Sync {
    fn load_profile(&self) -> Result<UserProfile, ScheduleError>;

    /// Upsert the given pairs into the persisted mapping, leaving
    /// untouched keys intact.
    fn merge_domain_mapping(&self, pairs: &[(Domain, String)]) -> Result<(), ScheduleError>;

    fn set_default_calendar(&self, calendar_id: Option<&str>) -> Result<(), ScheduleError>;
}
