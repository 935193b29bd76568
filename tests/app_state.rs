// tests/app_state.rs
//
// Startup wiring: config -> store -> state, bootstrap HR and snapshot reload.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt as _;

use lead_crm::config::CrmConfig;
use lead_crm::store::ActorStore;

fn config(snapshot: &std::path::Path) -> CrmConfig {
    let mut cfg = CrmConfig::default();
    cfg.snapshot_path = Some(snapshot.to_path_buf());
    cfg.auth.bootstrap_hr_email = Some("hr@example.com".into());
    cfg.auth.bootstrap_hr_name = Some("Head of People".into());
    cfg.auth.bootstrap_hr_password = Some("letmein".into());
    cfg
}

async fn post(app: &axum::Router, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(t) = token {
        req = req.header("authorization", format!("Bearer {t}"));
    }
    let resp = app
        .clone()
        .oneshot(req.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn bootstrap_hr_can_log_in_and_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = dir.path().join("crm.json");
    let cfg = config(&snapshot);

    let store = lead_crm::open_store(&cfg).unwrap();
    let state = lead_crm::build_state(&cfg, store).await.unwrap();
    let app = lead_crm::app(state, None);

    let (status, login) = post(
        &app,
        "/auth/login",
        None,
        json!({ "email": "hr@example.com", "password": "letmein" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["user"]["role"], "HR");
    let token = login["token"].as_str().unwrap().to_string();

    let (status, _) = post(
        &app,
        "/leads",
        Some(&token),
        json!({ "businessName": "Persisted Co", "targetScope": "common" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(snapshot.exists());

    // Second boot over the same snapshot: bootstrap is a no-op, data is back.
    let store = lead_crm::open_store(&cfg).unwrap();
    let actors = store.list_actors().await.unwrap();
    assert_eq!(actors.len(), 1);
    let state = lead_crm::build_state(&cfg, store.clone()).await.unwrap();
    assert_eq!(state.store.list_actors().await.unwrap().len(), 1);

    let app = lead_crm::app(state, None);
    let (_, login) = post(
        &app,
        "/auth/login",
        None,
        json!({ "email": "hr@example.com", "password": "letmein" }),
    )
    .await;
    let token = login["token"].as_str().unwrap().to_string();
    let resp = app
        .clone()
        .oneshot(
            Request::get("/leads?scope=common")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let leads: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(leads[0]["businessName"], "Persisted Co");
}

#[tokio::test]
async fn defaults_disable_external_providers() {
    let cfg = CrmConfig::default();
    let store = lead_crm::open_store(&cfg).unwrap();
    let state = lead_crm::build_state(&cfg, store).await.unwrap();
    assert_eq!(state.scraper.name(), "disabled");
    assert!(!state.notifier.is_enabled());
    assert!(state.store.list_actors().await.unwrap().is_empty());
}
