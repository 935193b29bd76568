// src/notify/calendar.rs
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{CalendarProvider, MeetingEvent, MeetingNotifier};
use crate::config::CalendarConfig;

/// Google Calendar v3 `events.insert` over plain HTTP with a bearer token.
#[derive(Clone)]
pub struct HttpCalendar {
    events_url: String,
    access_token: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl HttpCalendar {
    pub fn new(base_url: &str, calendar_id: &str, access_token: String) -> Self {
        Self {
            events_url: format!(
                "{}/calendars/{}/events",
                base_url.trim_end_matches('/'),
                calendar_id
            ),
            access_token,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 2,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn events_url(&self) -> &str {
        &self.events_url
    }
}

/// Delay before retry `attempt + 1`: 500ms doubling, capped at 32s.
fn backoff(attempt: u8) -> Duration {
    let exp = u32::from(attempt.saturating_sub(1)).min(6);
    Duration::from_millis(500u64 << exp)
}

#[derive(Serialize)]
struct EventDate {
    date: String,
}

#[derive(Serialize)]
struct InsertEvent<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventDate,
    end: EventDate,
}

impl<'a> InsertEvent<'a> {
    fn all_day(ev: &'a MeetingEvent) -> Self {
        Self {
            summary: &ev.summary,
            description: &ev.description,
            start: EventDate {
                date: ev.start.to_string(),
            },
            end: EventDate {
                date: ev.end.to_string(),
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    html_link: Option<String>,
}

#[async_trait::async_trait]
impl CalendarProvider for HttpCalendar {
    async fn create_event(&self, event: &MeetingEvent) -> Result<String> {
        let payload = InsertEvent::all_day(event);

        let mut attempt: u8 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let res = self
                .client
                .post(&self.events_url)
                .bearer_auth(&self.access_token)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    let status = rsp.status();
                    // 4xx will not get better on retry.
                    if status.is_client_error() {
                        return Err(anyhow!("calendar API rejected event: {status}"));
                    }
                    if !status.is_success() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(backoff(attempt)).await;
                            continue;
                        }
                        return Err(anyhow!("calendar API HTTP error: {status}"));
                    }
                    let created: InsertedEvent = rsp.json().await.unwrap_or(InsertedEvent {
                        id: None,
                        html_link: None,
                    });
                    return Ok(created
                        .html_link
                        .or(created.id)
                        .unwrap_or_else(|| "created".to_string()));
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(backoff(attempt)).await;
                        continue;
                    }
                    return Err(anyhow!("calendar API request failed: {e}"));
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "google-calendar"
    }
}

/// Disabled unless an access token is configured.
pub fn notifier_from_config(cfg: &CalendarConfig) -> MeetingNotifier {
    match cfg.access_token.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(token) => {
            let cal = HttpCalendar::new(&cfg.base_url, &cfg.calendar_id, token.to_string())
                .with_timeout(cfg.timeout_secs);
            MeetingNotifier::new(Arc::new(cal))
        }
        None => {
            tracing::info!(target: "calendar", "calendar notifications disabled (no access token)");
            MeetingNotifier::disabled()
        }
    }
}
