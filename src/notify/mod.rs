// src/notify/mod.rs
//! Best-effort meeting notifications. Nothing in here may fail or slow down
//! the request that triggered it.

pub mod calendar;

use anyhow::Result;
use chrono::NaiveDate;
use metrics::counter;
use std::sync::Arc;

use crate::model::Lead;

/// All-day event derived from a lead's meeting fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDate,
    /// Exclusive end, the day after `start`.
    pub end: NaiveDate,
}

impl MeetingEvent {
    /// `None` when the lead has no meeting date.
    pub fn from_lead(lead: &Lead) -> Option<Self> {
        let start = lead.meeting_date?;
        let end = start.succ_opt().unwrap_or(start);
        let summary = format!(
            "Meeting with {} ({})",
            lead.contact_name.as_deref().unwrap_or("Lead"),
            non_empty(&lead.business_name).unwrap_or("Company"),
        );
        let description = format!(
            "Phone: {}\nAddress: {}\nNotes: {}",
            lead.phone.as_deref().unwrap_or("N/A"),
            lead.address.as_deref().unwrap_or("N/A"),
            lead.call_notes.as_deref().unwrap_or(""),
        );
        Some(Self {
            summary,
            description,
            start,
            end,
        })
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

#[async_trait::async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Returns a reference to the created event (id or link).
    async fn create_event(&self, event: &MeetingEvent) -> Result<String>;
    fn name(&self) -> &'static str;
}

/// Fire-and-forget front for a `CalendarProvider`.
#[derive(Clone)]
pub struct MeetingNotifier {
    provider: Option<Arc<dyn CalendarProvider>>,
}

impl MeetingNotifier {
    pub fn new(provider: Arc<dyn CalendarProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn disabled() -> Self {
        Self { provider: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Spawns the calendar call and returns immediately. Must be called from
    /// within a tokio runtime.
    pub fn notify(&self, lead: &Lead) -> Option<tokio::task::JoinHandle<()>> {
        let provider = self.provider.clone()?;
        let event = MeetingEvent::from_lead(lead)?;
        let lead_id = lead.id;
        Some(tokio::spawn(async move {
            match provider.create_event(&event).await {
                Ok(reference) => {
                    counter!("calendar_notifications_total", "outcome" => "ok").increment(1);
                    tracing::info!(
                        target: "calendar",
                        lead_id,
                        provider = provider.name(),
                        %reference,
                        "calendar event created"
                    );
                }
                Err(e) => {
                    counter!("calendar_notifications_total", "outcome" => "error").increment(1);
                    tracing::warn!(
                        target: "calendar",
                        lead_id,
                        provider = provider.name(),
                        error = ?e,
                        "calendar event failed"
                    );
                }
            }
        }))
    }
}
