// tests/api_ingest.rs
//
// Batch ingestion over HTTP: raw CSV import, JSON bulk, webhook lead-gen.

mod common;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::*;
use lead_crm::ingest::scrape::ScrapeProvider;
use lead_crm::model::Role;

/// Returns a canned CSV and remembers what it was asked for.
struct CannedScraper {
    csv: &'static str,
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait::async_trait]
impl ScrapeProvider for CannedScraper {
    async fn fetch_csv(&self, query: &str, location: &str) -> Result<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), location.to_string()));
        Ok(self.csv.as_bytes().to_vec())
    }

    fn name(&self) -> &'static str {
        "canned"
    }
}

struct FailingScraper;

#[async_trait::async_trait]
impl ScrapeProvider for FailingScraper {
    async fn fetch_csv(&self, _query: &str, _location: &str) -> Result<Vec<u8>> {
        anyhow::bail!("scrape webhook timed out after 120s")
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn csv_import_end_to_end() {
    let state = test_state();
    let (me, t) = account(&state, "u1@example.com", Role::Intern, false).await;
    let app = lead_crm::router(state);

    let r = send_csv(
        &app,
        "/leads/import?scope=self",
        Some(&t),
        "Business Name,Phone\nAcme Co,+1-555-9999\n",
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.text());
    let report = r.json();
    assert_eq!(report["execution"]["leadsGenerated"], 1);
    assert_eq!(report["execution"]["status"], "Success");
    assert_eq!(report["rows"][0]["status"], "created");

    let leads = get(&app, "/leads", Some(&t)).await.json();
    let leads = leads.as_array().expect("array");
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0]["businessName"], "Acme Co");
    assert_eq!(leads[0]["phone"], "+1-555-9999");
    assert_eq!(leads[0]["status"], "Generated");
    assert_eq!(leads[0]["scope"]["id"], me.id);
}

#[tokio::test]
async fn reimport_is_idempotent_and_scoped() {
    let state = test_state();
    let (_, a) = account(&state, "a@example.com", Role::Intern, false).await;
    let (_, b) = account(&state, "b@example.com", Role::Intern, false).await;
    let app = lead_crm::router(state);
    let csv = "name,phone\nFirst,+1-555-0001\nSecond Name Same Phone,+1-555-0001\nNo Phone,\nNo Phone,\n";

    let first = send_csv(&app, "/leads/import", Some(&a), csv).await.json();
    assert_eq!(first["execution"]["leadsGenerated"], 2);
    let second = send_csv(&app, "/leads/import", Some(&a), csv).await.json();
    assert_eq!(second["execution"]["leadsGenerated"], 0);

    // Same phone in another scope is a different lead.
    let other = send_csv(&app, "/leads/import", Some(&b), csv).await.json();
    assert_eq!(other["execution"]["leadsGenerated"], 2);
}

#[tokio::test]
async fn malformed_row_keeps_success() {
    let state = test_state();
    let (_, t) = account(&state, "a@example.com", Role::Intern, false).await;
    let app = lead_crm::router(state);

    let csv = "Business Name,Phone\nA,1\nB,2\nbroken,3,oops\nD,4\nE,5\n";
    let report = send_csv(&app, "/leads/import", Some(&t), csv).await.json();
    assert_eq!(report["execution"]["leadsGenerated"], 4);
    assert_eq!(report["execution"]["status"], "Success");
    assert_eq!(report["execution"]["errors"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["execution"]["errors"][0]["row"], 3);
}

#[tokio::test]
async fn import_into_common_needs_access() {
    let state = test_state();
    let (_, plain) = account(&state, "plain@example.com", Role::Intern, false).await;
    let (_, hr) = account(&state, "hr@example.com", Role::Hr, false).await;
    let app = lead_crm::router(state);
    let csv = "Company,Tel\nShared Co,+1-555-7777\n";

    let r = send_csv(&app, "/leads/import?scope=common", Some(&plain), csv).await;
    assert_eq!(r.status, StatusCode::FORBIDDEN);

    let r = send_csv(&app, "/leads/import?scope=common", Some(&hr), csv).await;
    assert_eq!(r.status, StatusCode::OK);
    let shared = get(&app, "/leads?scope=common", Some(&hr)).await.json();
    assert_eq!(shared[0]["businessName"], "Shared Co");
    assert_eq!(shared[0]["scope"]["kind"], "shared");
}

#[tokio::test]
async fn bulk_json_records() {
    let state = test_state();
    let (_, t) = account(&state, "a@example.com", Role::Intern, false).await;
    let app = lead_crm::router(state);

    let body = json!([
        { "title": "Cafe Uno", "phone": "+1-555-1000", "address": "1 First Ave" },
        { "businessName": "Cafe Dos", "email": "hi@dos.test" },
        "not an object",
        { "company": "Cafe Uno again", "phone": "+1-555-1000" }
    ]);
    let r = send_json(
        &app,
        "POST",
        "/leads/bulk?query=cafes&location=Austin",
        Some(&t),
        body,
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.text());
    let report = r.json();
    assert_eq!(report["execution"]["leadsGenerated"], 2);
    assert_eq!(report["execution"]["name"], "cafes in Austin");
    assert_eq!(report["rows"][2]["status"], "error");
    assert_eq!(report["rows"][3]["status"], "existing");

    let leads = get(&app, "/leads", Some(&t)).await.json();
    let uno = leads
        .as_array()
        .expect("array")
        .iter()
        .find(|l| l["businessName"] == "Cafe Uno")
        .cloned()
        .expect("Cafe Uno stored");
    assert_eq!(uno["sourceQuery"], "cafes");
    assert_eq!(uno["sourceLocation"], "Austin");
}

#[tokio::test]
async fn lead_gen_returns_csv_and_records_execution() {
    let scraper = Arc::new(CannedScraper {
        csv: "title,phone,address\nPlumb Co,+1-555-2000,9 Pipe Rd\nDrain Inc,+1-555-2001,\n",
        calls: Mutex::new(Vec::new()),
    });
    let state = state_with(scraper.clone());
    let (_, t) = account(&state, "a@example.com", Role::Intern, false).await;
    let app = lead_crm::router(state);

    let r = send_json(
        &app,
        "POST",
        "/lead-gen",
        Some(&t),
        json!({ "query": "plumbers", "location": "Denver" }),
    )
    .await;
    assert_eq!(r.status, StatusCode::OK, "{}", r.text());
    assert!(r.headers["content-type"]
        .to_str()
        .unwrap_or_default()
        .starts_with("text/csv"));
    assert!(r.headers["content-disposition"]
        .to_str()
        .unwrap_or_default()
        .starts_with("attachment"));
    assert_eq!(r.headers["x-leads-generated"], "2");
    assert!(r.text().contains("Plumb Co"));
    assert_eq!(
        scraper.calls.lock().unwrap().as_slice(),
        &[("plumbers".to_string(), "Denver".to_string())]
    );

    let exec_id = r.headers["x-execution-id"]
        .to_str()
        .unwrap_or_default()
        .to_string();
    let exec = get(&app, &format!("/executions/{exec_id}"), Some(&t)).await.json();
    assert_eq!(exec["status"], "Success");
    assert_eq!(exec["leadsGenerated"], 2);
    assert!(exec["payload"].as_str().is_some_and(|p| p.contains("Drain Inc")));

    assert_eq!(get(&app, "/leads", Some(&t)).await.json().as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn lead_gen_upstream_failure_is_502_and_logged_as_failure() {
    let state = state_with(Arc::new(FailingScraper));
    let (_, t) = account(&state, "a@example.com", Role::Intern, false).await;
    let app = lead_crm::router(state);

    let r = send_json(
        &app,
        "POST",
        "/lead-gen",
        Some(&t),
        json!({ "query": "roofers", "location": "Reno" }),
    )
    .await;
    assert_eq!(r.status, StatusCode::BAD_GATEWAY);
    assert!(r.json()["error"].as_str().is_some_and(|e| e.contains("timed out")));

    let execs = get(&app, "/executions", Some(&t)).await.json();
    assert_eq!(execs[0]["status"], "Failure");
    assert_eq!(execs[0]["leadsGenerated"], 0);
    assert_eq!(execs[0]["name"], "roofers in Reno");
}

#[tokio::test]
async fn lead_gen_validates_input() {
    let app = {
        let state = test_state();
        let (_, t) = account(&state, "a@example.com", Role::Intern, false).await;
        (lead_crm::router(state), t)
    };
    let r = send_json(
        &app.0,
        "POST",
        "/lead-gen",
        Some(&app.1),
        json!({ "query": "  ", "location": "Reno" }),
    )
    .await;
    assert_eq!(r.status, StatusCode::BAD_REQUEST);
}
