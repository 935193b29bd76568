// src/ingest/normalize.rs
//! Record normalizer: loosely-shaped rows (CSV rows keyed by header, JSON
//! objects from callers) to a canonical `LeadDraft`.
//!
//! Header matching folds case and ignores spaces, `_` and `-`, so
//! "Business Name", "businessName" and "business_name" are the same header.
//! The alias table below is the only place that knows inbound field names.

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::model::{LeadDraft, Priority, PLACEHOLDER_BUSINESS_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    BusinessName,
    Phone,
    ContactName,
    Address,
    Email,
    Source,
    Priority,
    CalledBy,
    MeetingBy,
    ClosedBy,
    LastFollowUpDate,
    NextFollowUpDate,
    MeetingDate,
    CallNotes,
}

/// Ordered aliases per field, already folded (see `fold_header`).
/// Earlier aliases win when a row carries several of them.
const ALIASES: &[(Field, &[&str])] = &[
    (Field::BusinessName, &["businessname", "name", "title", "company", "companyname"]),
    (Field::Phone, &["phone", "phonenumber", "telephone", "tel", "mobile"]),
    (Field::ContactName, &["contactname", "contact", "owner", "person"]),
    (Field::Address, &["address", "fulladdress", "streetaddress"]),
    (Field::Email, &["email", "emailaddress", "mail"]),
    (Field::Source, &["source", "leadsource"]),
    (Field::Priority, &["priority"]),
    (Field::CalledBy, &["calledby"]),
    (Field::MeetingBy, &["meetingby"]),
    (Field::ClosedBy, &["closedby"]),
    (Field::LastFollowUpDate, &["lastfollowupdate", "lastfollowup"]),
    (Field::NextFollowUpDate, &["nextfollowupdate", "nextfollowup"]),
    (Field::MeetingDate, &["meetingdate", "meeting"]),
    (Field::CallNotes, &["callnotes", "notes", "note"]),
];

fn aliases(field: Field) -> &'static [&'static str] {
    ALIASES
        .iter()
        .find(|(f, _)| *f == field)
        .map(|(_, a)| *a)
        .unwrap_or(&[])
}

/// Lowercase and drop separators: "Business Name" -> "businessname".
pub fn fold_header(h: &str) -> String {
    h.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '_' | '-' | '.'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Decode entities, collapse whitespace, trim. Empty results become `None`.
pub fn clean_value(raw: &str) -> Option<String> {
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let decoded = html_escape::decode_html_entities(raw);
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    let out = re_ws.replace_all(&decoded, " ");
    let out = out.trim();
    if out.is_empty() {
        None
    } else {
        Some(out.to_string())
    }
}

/// Accepts `YYYY-MM-DD`, or the date part of a longer timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// One inbound row, header order preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (fold_header(&k), v))
                .collect(),
        }
    }

    /// JSON objects only. Scalars are stringified, nulls and nested values
    /// are ignored.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let Value::Object(map) = value else {
            return Err(format!("expected an object, got {}", json_kind(value)));
        };
        let fields = map
            .iter()
            .filter_map(|(k, v)| {
                let s = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return None,
                };
                Some((k.clone(), s))
            })
            .collect();
        Ok(Self::new(fields))
    }

    fn first(&self, field: Field) -> Option<String> {
        aliases(field).iter().find_map(|alias| {
            self.fields
                .iter()
                .filter(|(k, _)| k == alias)
                .find_map(|(_, v)| clean_value(v))
        })
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Run metadata stamped onto every draft of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeContext {
    pub query: Option<String>,
    pub location: Option<String>,
    /// Used when the row carries no source of its own.
    pub source: Option<String>,
}

pub fn normalize(record: &RawRecord, ctx: &NormalizeContext) -> LeadDraft {
    let date = |f: Field| record.first(f).as_deref().and_then(parse_date);
    LeadDraft {
        business_name: record
            .first(Field::BusinessName)
            .unwrap_or_else(|| PLACEHOLDER_BUSINESS_NAME.to_string()),
        phone: record.first(Field::Phone),
        contact_name: record.first(Field::ContactName),
        address: record.first(Field::Address),
        email: record.first(Field::Email),
        source_query: ctx.query.clone(),
        source_location: ctx.location.clone(),
        source: record.first(Field::Source).or_else(|| ctx.source.clone()),
        status: None,
        priority: record
            .first(Field::Priority)
            .and_then(|p| Priority::parse(&p)),
        called_by: record.first(Field::CalledBy),
        meeting_by: record.first(Field::MeetingBy),
        closed_by: record.first(Field::ClosedBy),
        last_follow_up_date: date(Field::LastFollowUpDate),
        next_follow_up_date: date(Field::NextFollowUpDate),
        meeting_date: date(Field::MeetingDate),
        call_notes: record.first(Field::CallNotes),
    }
}
