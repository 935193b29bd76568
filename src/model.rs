// src/model.rs
//! Domain types shared by the store, the ingestion pipeline and the HTTP layer.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LEAD_STATUS: &str = "Generated";
pub const PLACEHOLDER_BUSINESS_NAME: &str = "Unknown";
pub const NEW_LEAD_BUSINESS_NAME: &str = "New Lead";

pub const EXECUTION_IN_PROGRESS: &str = "In Progress";
pub const EXECUTION_SUCCESS: &str = "Success";
pub const EXECUTION_FAILURE: &str = "Failure";

pub type LeadId = u64;
pub type ExecutionId = u64;
pub type ActorId = u64;

/// Partition in which dedup uniqueness and visibility are evaluated.
///
/// The shared pool is its own variant so it can never collide with a real
/// actor id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Actor(ActorId),
    Shared,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scope::Actor(id) => write!(f, "actor:{id}"),
            Scope::Shared => f.write_str("shared"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Hot,
    #[default]
    Warm,
    Cold,
}

impl Priority {
    /// Case-insensitive parse of HOT/WARM/COLD.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "HOT" => Some(Priority::Hot),
            "WARM" => Some(Priority::Warm),
            "COLD" => Some(Priority::Cold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Hot => "HOT",
            Priority::Warm => "WARM",
            Priority::Cold => "COLD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: LeadId,
    pub business_name: String,
    pub contact_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source_query: Option<String>,
    pub source_location: Option<String>,
    pub source: Option<String>,
    pub status: String,
    pub priority: Priority,
    pub called_by: Option<String>,
    pub meeting_by: Option<String>,
    pub closed_by: Option<String>,
    pub last_follow_up_date: Option<NaiveDate>,
    pub next_follow_up_date: Option<NaiveDate>,
    pub meeting_date: Option<NaiveDate>,
    pub call_notes: Option<String>,
    pub duplicate_found: bool,
    pub scope: Scope,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Canonical lead shape before it has an identity or an owning scope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeadDraft {
    pub business_name: String,
    pub contact_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub source_query: Option<String>,
    pub source_location: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub called_by: Option<String>,
    pub meeting_by: Option<String>,
    pub closed_by: Option<String>,
    pub last_follow_up_date: Option<NaiveDate>,
    pub next_follow_up_date: Option<NaiveDate>,
    pub meeting_date: Option<NaiveDate>,
    pub call_notes: Option<String>,
}

impl LeadDraft {
    /// Materialize the draft into a lead owned by `scope`.
    pub fn into_lead(self, id: LeadId, scope: Scope, now: DateTime<Utc>) -> Lead {
        Lead {
            id,
            business_name: self.business_name,
            contact_name: self.contact_name,
            address: self.address,
            phone: self.phone,
            email: self.email,
            source_query: self.source_query,
            source_location: self.source_location,
            source: self.source,
            status: self
                .status
                .unwrap_or_else(|| DEFAULT_LEAD_STATUS.to_string()),
            priority: self.priority.unwrap_or_default(),
            called_by: self.called_by,
            meeting_by: self.meeting_by,
            closed_by: self.closed_by,
            last_follow_up_date: self.last_follow_up_date,
            next_follow_up_date: self.next_follow_up_date,
            meeting_date: self.meeting_date,
            call_notes: self.call_notes,
            duplicate_found: false,
            scope,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update. Outer `None` leaves a field untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadPatch {
    pub business_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub contact_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub source: Option<Option<String>>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    #[serde(default, deserialize_with = "present")]
    pub called_by: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub meeting_by: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub closed_by: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub last_follow_up_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub next_follow_up_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub meeting_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub call_notes: Option<Option<String>>,
    pub duplicate_found: Option<bool>,
}

fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

impl LeadPatch {
    /// True when the patch sets a meeting date (not when it clears one).
    pub fn sets_meeting_date(&self) -> bool {
        matches!(self.meeting_date, Some(Some(_)))
    }

    pub fn apply(self, lead: &mut Lead, now: DateTime<Utc>) {
        fn set<T>(slot: &mut Option<T>, v: Option<Option<T>>) {
            if let Some(v) = v {
                *slot = v;
            }
        }

        if let Some(name) = self.business_name {
            let name = name.trim();
            if !name.is_empty() {
                lead.business_name = name.to_string();
            }
        }
        set(&mut lead.contact_name, self.contact_name);
        set(&mut lead.address, self.address);
        set(&mut lead.phone, self.phone);
        set(&mut lead.email, self.email);
        set(&mut lead.source, self.source);
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(p) = self.priority {
            lead.priority = p;
        }
        set(&mut lead.called_by, self.called_by);
        set(&mut lead.meeting_by, self.meeting_by);
        set(&mut lead.closed_by, self.closed_by);
        set(&mut lead.last_follow_up_date, self.last_follow_up_date);
        set(&mut lead.next_follow_up_date, self.next_follow_up_date);
        set(&mut lead.meeting_date, self.meeting_date);
        set(&mut lead.call_notes, self.call_notes);
        if let Some(d) = self.duplicate_found {
            lead.duplicate_found = d;
        }
        lead.updated_at = now;
    }
}

/// One row that could not be ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub business_name: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: ExecutionId,
    pub name: String,
    pub query: Option<String>,
    pub location: Option<String>,
    pub date: DateTime<Utc>,
    pub leads_generated: u64,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(default)]
    pub errors: Vec<RowError>,
    /// Scope the run wrote into; visibility of the record follows it.
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<ActorId>,
}

impl Execution {
    /// Listing view: everything except the retained payload.
    pub fn without_payload(mut self) -> Self {
        self.payload = None;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExecution {
    pub name: Option<String>,
    pub query: Option<String>,
    pub location: Option<String>,
    /// `None` lets the store record the run as in progress.
    pub status: Option<String>,
    pub leads_generated: u64,
    pub payload: Option<String>,
    pub scope: Scope,
    pub created_by: Option<ActorId>,
}

impl NewExecution {
    pub fn new(scope: Scope, created_by: Option<ActorId>) -> Self {
        Self {
            name: None,
            query: None,
            location: None,
            status: None,
            leads_generated: 0,
            payload: None,
            scope,
            created_by,
        }
    }

    pub fn display_name(&self) -> String {
        if let Some(n) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return n.to_string();
        }
        match (self.query.as_deref(), self.location.as_deref()) {
            (Some(q), Some(l)) => format!("{q} in {l}"),
            (Some(q), None) => q.to_string(),
            (None, Some(l)) => l.to_string(),
            (None, None) => "Import".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Intern,
    #[serde(rename = "HR")]
    Hr,
}

impl Role {
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Hr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub shared_pool_access: bool,
}

impl Actor {
    pub fn own_scope(&self) -> Scope {
        Scope::Actor(self.id)
    }
}

/// Stored actor row; the credential hash never leaves the store/auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRecord {
    #[serde(flatten)]
    pub actor: Actor,
    pub credential_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActor {
    pub name: String,
    pub email: String,
    pub credential_hash: String,
    pub role: Role,
    pub shared_pool_access: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lead() -> Lead {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        LeadDraft {
            business_name: "Acme".into(),
            phone: Some("+1-555-0101".into()),
            meeting_date: NaiveDate::from_ymd_opt(2025, 2, 1),
            ..Default::default()
        }
        .into_lead(1, Scope::Actor(7), now)
    }

    #[test]
    fn draft_defaults_status_and_priority() {
        let l = lead();
        assert_eq!(l.status, DEFAULT_LEAD_STATUS);
        assert_eq!(l.priority, Priority::Warm);
        assert!(!l.duplicate_found);
    }

    #[test]
    fn patch_distinguishes_absent_from_null() {
        let mut l = lead();
        let patch: LeadPatch =
            serde_json::from_str(r#"{"meetingDate": null, "status": "Called"}"#).unwrap();
        assert!(!patch.sets_meeting_date());
        patch.apply(&mut l, Utc::now());
        assert_eq!(l.meeting_date, None);
        assert_eq!(l.phone.as_deref(), Some("+1-555-0101"));
        assert_eq!(l.status, "Called");
    }

    #[test]
    fn patch_ignores_blank_business_name() {
        let mut l = lead();
        let patch: LeadPatch = serde_json::from_str(r#"{"businessName": "  "}"#).unwrap();
        patch.apply(&mut l, Utc::now());
        assert_eq!(l.business_name, "Acme");
    }

    #[test]
    fn scope_serializes_tagged() {
        let s = serde_json::to_value(Scope::Actor(3)).unwrap();
        assert_eq!(s, serde_json::json!({"kind": "actor", "id": 3}));
        let s = serde_json::to_value(Scope::Shared).unwrap();
        assert_eq!(s, serde_json::json!({"kind": "shared"}));
    }

    #[test]
    fn role_serializes_wire_labels() {
        assert_eq!(serde_json::to_value(Role::Hr).unwrap(), "HR");
        assert_eq!(serde_json::to_value(Role::Intern).unwrap(), "Intern");
    }
}
