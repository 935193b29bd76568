// src/api/mod.rs
//! HTTP surface. Handlers are thin: they authenticate, ask the policy, and
//! delegate to the store or the ingestion pipeline.

mod accounts;
mod executions;
mod imports;
mod leads;

use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::{bearer_token, AuthProvider};
use crate::error::CrmError;
use crate::ingest::scrape::ScrapeProvider;
use crate::model::{Actor, ActorId};
use crate::notify::MeetingNotifier;
use crate::policy::{ScopeRequest, VisibilityPolicy};
use crate::store::Store;

/// Shared handles for every request. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth: Arc<dyn AuthProvider>,
    pub policy: Arc<VisibilityPolicy>,
    pub scraper: Arc<dyn ScrapeProvider>,
    pub notifier: MeetingNotifier,
}

/// The authenticated caller, as currently stored.
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = CrmError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)
            .ok_or_else(|| CrmError::Unauthenticated("Access denied. No token provided.".into()))?;
        state.auth.verify(token).await.map(CurrentActor)
    }
}

/// `axum::Json` whose rejection is a `CrmError`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(CrmError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(CrmError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(Path), rejection(CrmError))]
pub struct ApiPath<T>(pub T);

/// `?scope=&status=&targetUserId=` shared by the listing-style routes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScopeQuery {
    pub scope: Option<String>,
    pub status: Option<String>,
    pub target_user_id: Option<ActorId>,
}

impl ScopeQuery {
    fn request(&self) -> Result<ScopeRequest, CrmError> {
        ScopeRequest::parse(self.scope.as_deref())
    }

    fn status(&self) -> Option<String> {
        self.status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "OK" }))
        .route("/health", get(|| async { "OK" }))
        .route("/auth/register", post(accounts::register))
        .route("/auth/login", post(accounts::login))
        .route("/users", post(accounts::create_user).get(accounts::list_users))
        .route("/users/{id}", axum::routing::delete(accounts::delete_user))
        .route("/users/{id}/access", put(accounts::set_access))
        .route("/leads", get(leads::list).post(leads::create))
        .route("/leads/{id}", put(leads::update).delete(leads::remove))
        .route("/leads/bulk", post(imports::bulk))
        .route("/leads/import", post(imports::import_csv))
        .route("/leads/export", get(imports::export_csv))
        .route("/stats", get(leads::stats))
        .route("/lead-gen", post(imports::lead_gen))
        .route("/executions", get(executions::list).post(executions::create))
        .route("/executions/{id}", get(executions::get_one).put(executions::update))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}
