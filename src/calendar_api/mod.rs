//! HTTP calendar provider client.
//!
//! Direct REST access via reqwest against a CalDAV-style events API.
//! Authentication flows live outside this crate; the client is handed a
//! ready bearer token. Transient failures (timeouts, 408/429, 5xx) are
//! retried with exponential backoff and honor Retry-After.
//!
//! Modules:
//! - events: calendar listing, event fetch/create/delete, the
//!   `CalendarService` impl

pub mod events;

use std::time::Duration;

use crate::error::ScheduleError;

pub const DEFAULT_BASE_URL: &str = "https://calendar.googleapis.com/calendar/v3";

// ============================================================================
// Error type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CalendarApiError {
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Token expired or revoked")]
    AuthExpired,
    #[error("Rate limited")]
    RateLimited,
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CalendarApiError> for ScheduleError {
    fn from(err: CalendarApiError) -> Self {
        match err {
            CalendarApiError::RateLimited => ScheduleError::RateLimited,
            other => ScheduleError::Calendar(other.to_string()),
        }
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Bounds for retrying transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 250,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryPolicy {
    /// Wait before the next attempt: doubles per completed attempt from
    /// the initial value, capped.
    fn backoff(&self, completed_attempts: u32) -> Duration {
        let mut ms = self.initial_backoff_ms;
        for _ in 1..completed_attempts {
            ms = ms.saturating_mul(2).min(self.max_backoff_ms);
        }
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }
}

/// Statuses worth a second try: rate limiting, request timeout, any 5xx.
fn transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Numeric Retry-After, clamped so a hostile header cannot park the
/// scheduling flow for minutes.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(secs.min(30)))
}

// ============================================================================
// Client
// ============================================================================

/// Calendar provider client. One instance per authenticated account.
#[derive(Debug, Clone)]
pub struct CalendarApi {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    retry: RetryPolicy,
}

impl CalendarApi {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: access_token.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Point the client at a different endpoint. Test hook.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request, retrying transient failures per the client's
    /// policy. A request that cannot be cloned (streaming body) goes out
    /// exactly once.
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, CalendarApiError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let Some(try_request) = request.try_clone() else {
                return Ok(request.send().await?);
            };
            let out_of_attempts = attempt >= max_attempts;

            match try_request.send().await {
                Ok(resp) if transient_status(resp.status()) && !out_of_attempts => {
                    let wait = parse_retry_after(resp.headers())
                        .unwrap_or_else(|| self.retry.backoff(attempt));
                    log::warn!(
                        "calendar request got HTTP {}, retry {attempt}/{max_attempts} in {wait:?}",
                        resp.status()
                    );
                    tokio::time::sleep(wait).await;
                }
                Ok(resp) => return Ok(resp),
                Err(err) if (err.is_timeout() || err.is_connect()) && !out_of_attempts => {
                    let wait = self.retry.backoff(attempt);
                    log::warn!(
                        "calendar request failed in transport ({err}), \
                         retry {attempt}/{max_attempts} in {wait:?}"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(CalendarApiError::Http(err)),
            }
        }
    }
}
