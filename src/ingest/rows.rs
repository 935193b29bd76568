// src/ingest/rows.rs
//! Turning raw payloads into per-row records. A bad row is kept as an error
//! entry so its siblings still get processed; only an unreadable header fails
//! the whole payload.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use super::normalize::RawRecord;

pub type ParsedRow = Result<RawRecord, String>;

pub fn parse_csv(bytes: &[u8]) -> Result<Vec<ParsedRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(anyhow!("CSV payload has no header row"));
    }

    let rows = reader
        .records()
        .map(|res| match res {
            Ok(rec) => Ok(RawRecord::new(
                headers
                    .iter()
                    .cloned()
                    .zip(rec.iter().map(str::to_string))
                    .collect(),
            )),
            Err(e) => Err(describe_csv_error(&e)),
        })
        .collect();
    Ok(rows)
}

fn describe_csv_error(e: &csv::Error) -> String {
    match e.kind() {
        csv::ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => format!("row has {len} fields, header has {expected_len}"),
        csv::ErrorKind::Utf8 { .. } => "row is not valid UTF-8".to_string(),
        _ => e.to_string(),
    }
}

pub fn parse_json_records(items: &[Value]) -> Vec<ParsedRow> {
    items.iter().map(RawRecord::from_json).collect()
}

/// CSV in the reimport format: the normalizer's own aliases as headers.
pub fn leads_to_csv(leads: &[crate::model::Lead]) -> Result<Vec<u8>> {
    let mut w = csv::Writer::from_writer(Vec::new());
    w.write_record([
        "Business Name",
        "Contact Name",
        "Phone",
        "Email",
        "Address",
        "Status",
        "Priority",
        "Source",
        "Meeting Date",
        "Next Follow Up Date",
        "Notes",
    ])?;
    for l in leads {
        let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        w.write_record([
            l.business_name.clone(),
            l.contact_name.clone().unwrap_or_default(),
            l.phone.clone().unwrap_or_default(),
            l.email.clone().unwrap_or_default(),
            l.address.clone().unwrap_or_default(),
            l.status.clone(),
            l.priority.as_str().to_string(),
            l.source.clone().unwrap_or_default(),
            date(l.meeting_date),
            date(l.next_follow_up_date),
            l.call_notes.clone().unwrap_or_default(),
        ])?;
    }
    w.into_inner().map_err(|e| anyhow!("flushing CSV: {}", e.error()))
}
