// tests/common/mod.rs
//
// Shared in-process harness: a router over a fresh MemoryStore, driven with
// tower::ServiceExt::oneshot (no sockets).
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt as _;

use lead_crm::auth::{AuthProvider, NewAccount, SessionAuth};
use lead_crm::ingest::scrape::{DisabledScraper, ScrapeProvider};
use lead_crm::model::{Actor, Role};
use lead_crm::notify::MeetingNotifier;
use lead_crm::policy::VisibilityPolicy;
use lead_crm::store::{MemoryStore, Store};
use lead_crm::AppState;

pub const BODY_LIMIT: usize = 1024 * 1024;
pub const SUPER_ADMIN: &str = "boss@example.com";

pub fn state_with(scraper: Arc<dyn ScrapeProvider>) -> AppState {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::in_memory());
    AppState {
        auth: Arc::new(SessionAuth::new(store.clone(), 24)),
        store,
        policy: Arc::new(VisibilityPolicy::new(Some(SUPER_ADMIN.to_string()))),
        scraper,
        notifier: MeetingNotifier::disabled(),
    }
}

pub fn test_state() -> AppState {
    state_with(Arc::new(DisabledScraper))
}

/// Creates an account directly through the auth provider and logs it in.
pub async fn account(state: &AppState, email: &str, role: Role, shared: bool) -> (Actor, String) {
    let actor = state
        .auth
        .register(NewAccount {
            name: email.split('@').next().unwrap_or("user").to_string(),
            email: email.to_string(),
            password: "pw-123456".to_string(),
            role,
            shared_pool_access: shared,
        })
        .await
        .expect("register account");
    let session = state
        .auth
        .login(email, "pw-123456")
        .await
        .expect("login account");
    (actor, session.token)
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Vec<u8>,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    body: Vec<u8>,
) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header("authorization", format!("Bearer {t}"));
    }
    if let Some(ct) = content_type {
        req = req.header("content-type", ct);
    }
    let req = req.body(Body::from(body)).expect("build request");
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    Reply {
        status,
        headers,
        bytes,
    }
}

pub async fn get(app: &Router, uri: &str, token: Option<&str>) -> Reply {
    call(app, "GET", uri, token, None, Vec::new()).await
}

pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Value,
) -> Reply {
    call(
        app,
        method,
        uri,
        token,
        Some("application/json"),
        body.to_string().into_bytes(),
    )
    .await
}

pub async fn send_csv(app: &Router, uri: &str, token: Option<&str>, csv: &str) -> Reply {
    call(app, "POST", uri, token, Some("text/csv"), csv.as_bytes().to_vec()).await
}
