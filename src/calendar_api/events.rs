//! Calendar API v3 — calendar listing and event CRUD.
//!
//! Wire types mirror the provider's JSON; normalization into crate types
//! happens at this boundary so nothing upstream sees raw payloads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CalendarApi, CalendarApiError};
use crate::error::ScheduleError;
use crate::ports::CalendarService;
use crate::types::{Calendar, CalendarEvent, NewCalendarEvent};

// ============================================================================
// API response types (deserialized from provider JSON)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarEntryRaw>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarEntryRaw {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    access_role: Option<String>,
    #[serde(default)]
    primary: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventRaw>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRaw {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NewEventBody {
    summary: String,
    start: EventDateTime,
    end: EventDateTime,
}

#[derive(Debug, Deserialize)]
struct CreatedEventResponse {
    id: String,
}

fn writable_role(role: Option<&str>) -> bool {
    matches!(role, Some("owner") | Some("writer"))
}

/// Parse a provider datetime: RFC 3339, or bare date for all-day events
/// (treated as midnight UTC).
pub fn parse_event_datetime(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if s.contains('T') {
        DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00"))
            .or_else(|_| DateTime::parse_from_rfc3339(s))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    } else {
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
    }
}

fn raw_datetime(slot: Option<&EventDateTime>) -> Option<DateTime<Utc>> {
    slot.and_then(|s| s.date_time.as_deref().or(s.date.as_deref()))
        .and_then(parse_event_datetime)
}

// ============================================================================
// Raw API calls
// ============================================================================

impl CalendarApi {
    /// All calendars visible to the account, paginated.
    async fn fetch_calendar_list(&self) -> Result<Vec<CalendarEntryRaw>, CalendarApiError> {
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.url("/users/me/calendarList"))
                .bearer_auth(&self.access_token)
                .query(&[("maxResults", "250")]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let resp = self.send(request).await?;
            let body: CalendarListResponse = check(resp).await?.json().await?;

            all.extend(body.items);
            page_token = body.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(all)
    }

    /// Events on one calendar over `[start, end)`, paginated. Cancelled
    /// events are dropped here; events the provider returns without usable
    /// start/end are dropped too.
    async fn fetch_events(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarApiError> {
        let time_min = start.to_rfc3339();
        let time_max = end.to_rfc3339();

        let mut events = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.url(&format!("/calendars/{calendar_id}/events")))
                .bearer_auth(&self.access_token)
                .query(&[
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", "250"),
                ]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let resp = self.send(request).await?;
            let body: EventsResponse = check(resp).await?.json().await?;

            for item in body.items {
                if item.status.as_deref() == Some("cancelled") {
                    continue;
                }
                let (Some(start), Some(end)) = (
                    raw_datetime(item.start.as_ref()),
                    raw_datetime(item.end.as_ref()),
                ) else {
                    continue;
                };
                events.push(CalendarEvent {
                    id: item.id,
                    calendar_id: calendar_id.to_string(),
                    title: item.summary.unwrap_or_default(),
                    start,
                    end,
                });
            }

            page_token = body.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        Ok(events)
    }

    async fn post_event(&self, event: &NewCalendarEvent) -> Result<String, CalendarApiError> {
        let body = NewEventBody {
            summary: event.title.clone(),
            start: EventDateTime {
                date_time: Some(event.start.to_rfc3339()),
                date: None,
            },
            end: EventDateTime {
                date_time: Some(event.end.to_rfc3339()),
                date: None,
            },
        };

        let request = self
            .http
            .post(self.url(&format!("/calendars/{}/events", event.calendar_id)))
            .bearer_auth(&self.access_token)
            .json(&body);

        let resp = self.send(request).await?;
        let created: CreatedEventResponse = check(resp).await?.json().await?;
        Ok(created.id)
    }

    async fn remove_event(
        &self,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), CalendarApiError> {
        let request = self
            .http
            .delete(self.url(&format!("/calendars/{calendar_id}/events/{event_id}")))
            .bearer_auth(&self.access_token);

        let resp = self.send(request).await?;
        let status = resp.status();
        // Already gone counts as deleted.
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return Ok(());
        }
        check(resp).await?;
        Ok(())
    }
}

/// Map non-success statuses onto the error enum.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, CalendarApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(CalendarApiError::AuthExpired);
    }
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(CalendarApiError::RateLimited);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(CalendarApiError::ApiError {
        status: status.as_u16(),
        message,
    })
}

// ============================================================================
// CalendarService impl
// ============================================================================

#[async_trait]
impl CalendarService for CalendarApi {
    async fn list_writable_calendars(&self) -> Result<Vec<Calendar>, ScheduleError> {
        let entries = self.fetch_calendar_list().await?;
        Ok(entries
            .into_iter()
            .filter(|e| !e.id.is_empty() && writable_role(e.access_role.as_deref()))
            .map(|e| Calendar {
                id: e.id,
                title: e.summary.unwrap_or_default(),
                writable: true,
            })
            .collect())
    }

    async fn default_calendar_id(&self) -> Result<Option<String>, ScheduleError> {
        let entries = self.fetch_calendar_list().await?;
        Ok(entries
            .into_iter()
            .find(|e| e.primary == Some(true) && writable_role(e.access_role.as_deref()))
            .map(|e| e.id))
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, ScheduleError> {
        Ok(self.fetch_events(calendar_id, start, end).await?)
    }

    async fn create_event(&self, event: &NewCalendarEvent) -> Result<String, ScheduleError> {
        Ok(self.post_event(event).await?)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), ScheduleError> {
        Ok(self.remove_event(calendar_id, event_id).await?)
    }
}
