//! Google Calendar event sink.
//!
//! Targets the Calendar v3 `events.insert` REST endpoint with a bearer
//! token. Token acquisition and refresh live outside this pipeline; the sink
//! receives a ready-to-use access token.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{DispatchError, DispatchResult};
use crate::traits::{EventSink, NewEvent};

/// Default Calendar API base URL.
const CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Calendar sink backed by the Google Calendar v3 API.
pub struct GoogleCalendarSink {
    /// OAuth bearer token (provisioned externally).
    token: String,
    /// Target calendar, usually `primary`.
    calendar_id: String,
    /// IANA timezone label sent alongside event timestamps.
    timezone: String,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleCalendarSink {
    /// Create a sink for the given calendar.
    pub fn new(
        token: impl Into<String>,
        calendar_id: impl Into<String>,
        timezone: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            token: token.into(),
            calendar_id: calendar_id.into(),
            timezone: timezone.into(),
            base_url: CALENDAR_BASE_URL.to_owned(),
            client,
        }
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build the `events.insert` request body for an event.
    ///
    /// The priority marker becomes a calendar color id: `1` for
    /// high-priority events, `2` otherwise.
    pub fn build_event_payload(event: &NewEvent, timezone: &str) -> Value {
        json!({
            "summary": event.title,
            "description": event.description,
            "start": {
                "dateTime": event.start.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
                "timeZone": timezone,
            },
            "end": {
                "dateTime": event.end.to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
                "timeZone": timezone,
            },
            "colorId": if event.high_priority { "1" } else { "2" },
        })
    }
}

#[async_trait]
impl EventSink for GoogleCalendarSink {
    async fn create_event(&self, event: &NewEvent) -> DispatchResult<()> {
        if self.token.is_empty() {
            return Err(DispatchError::MissingCredential { service: "calendar" });
        }

        let url = format!(
            "{}/calendars/{}/events",
            self.base_url, self.calendar_id
        );
        let payload = Self::build_event_payload(event, &self.timezone);

        debug!(title = %event.title, start = %event.start, "creating calendar event");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DispatchError::RequestFailed {
                service: "calendar",
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DispatchError::ApiError {
                service: "calendar",
                status: status.as_u16(),
                body,
            });
        }

        info!(title = %event.title, "calendar event created");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
