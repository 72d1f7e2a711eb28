//! Error types for scheduling operations
//!
//! Errors are classified by recoverability:
//! - Retryable: network issues, timeouts, provider rate limits
//! - NonRetryable: misconfiguration, malformed data, store failures
//!
//! Per-item calendar failures inside a batch are never surfaced through
//! this type — they are logged at the call site and reflected in counts.
//! `ScheduleError` covers the structural failures that prevent an
//! operation from running at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    // Retryable errors
    #[error("Calendar provider error: {0}")]
    Calendar(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Provider rate limit exceeded")]
    RateLimited,

    // Non-retryable errors
    #[error("Profile store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Undo window expired ({0} minutes since apply)")]
    UndoExpired(i64),
}

impl ScheduleError {
    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScheduleError::Calendar(_)
                | ScheduleError::Classifier(_)
                | ScheduleError::RateLimited
        )
    }
}

impl From<rusqlite::Error> for ScheduleError {
    fn from(err: rusqlite::Error) -> Self {
        ScheduleError::Store(err.to_string())
    }
}
