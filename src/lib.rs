//! arcplan — scheduling assist for activity lists.
//!
//! Takes a user's flat activity list plus their calendars and turns "help
//! me plan this week" into concrete, reversible calendar events. The
//! pipeline: score activities for recommendation order, infer a
//! scheduling domain per activity, aggregate busy intervals across
//! calendars, greedily propose conflict-free slots, then apply the batch
//! with a two-hour undo window.
//!
//! Everything network-facing goes through the trait seams in [`ports`];
//! the reqwest-backed adapters live in [`calendar_api`] and
//! [`classifier_api`], and the profile persists via [`profile`].

pub mod apply;
pub mod busy;
pub mod calendar_api;
pub mod classifier_api;
pub mod domain;
pub mod error;
pub mod ports;
pub mod profile;
pub mod propose;
pub mod scoring;
pub mod search;
pub mod session;
pub mod types;

pub use apply::{ApplyOrchestrator, ApplyOutcome, UNDO_WINDOW_MINUTES};
pub use busy::{load_busy, BusyIndex, ALL_CALENDARS, MAX_CALENDARS};
pub use domain::{infer_local, DomainInference, MAX_REMOTE_BATCH};
pub use error::ScheduleError;
pub use ports::{CalendarService, DomainClassifier, ProfileStore};
pub use propose::{batch_collisions, propose, MIN_DURATION_MINUTES, SLOT_STEP_MINUTES};
pub use search::{search_activities, SearchMatch};
pub use session::SchedulingSession;
pub use types::{
    Activity, ActivityStatus, ApplyRecord, BusyInterval, Calendar, CalendarEvent, Domain,
    NewCalendarEvent, ScheduleProposal, UserProfile,
};
