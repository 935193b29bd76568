// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod policy;
pub mod store;

pub use crate::api::{router, AppState};
pub use crate::error::{CrmError, CrmResult};

use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;

use crate::auth::SessionAuth;
use crate::config::CrmConfig;
use crate::policy::VisibilityPolicy;
use crate::store::{MemoryStore, Store};

/// Opens the store named by the config (snapshot file or purely in memory).
pub fn open_store(cfg: &CrmConfig) -> Result<Arc<dyn Store>> {
    Ok(match &cfg.snapshot_path {
        Some(path) => Arc::new(
            MemoryStore::open(path)
                .with_context(|| format!("opening store snapshot {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::in_memory()),
    })
}

/// Wires providers around an already-open store and provisions the bootstrap
/// HR account when one is configured.
pub async fn build_state(cfg: &CrmConfig, store: Arc<dyn Store>) -> Result<AppState> {
    let auth = SessionAuth::new(store.clone(), cfg.auth.session_ttl_hours);
    match (
        cfg.auth.bootstrap_hr_email.as_deref(),
        cfg.auth.bootstrap_hr_password.as_deref(),
    ) {
        (Some(email), Some(password)) => {
            auth.ensure_bootstrap_hr(cfg.auth.bootstrap_hr_name.as_deref(), email, password)
                .await
                .context("provisioning bootstrap HR account")?;
        }
        (Some(_), None) => {
            tracing::warn!(target: "auth", "bootstrap HR email set without a password; skipped");
        }
        _ => {}
    }

    Ok(AppState {
        store,
        auth: Arc::new(auth),
        policy: Arc::new(VisibilityPolicy::new(cfg.admin_email.clone())),
        scraper: ingest::scrape::from_config(&cfg.scrape),
        notifier: notify::calendar::notifier_from_config(&cfg.calendar),
    })
}

/// Full application router, with `/metrics` when a recorder is available.
pub fn app(state: AppState, metrics: Option<&crate::metrics::Metrics>) -> Router {
    let router = api::router(state);
    match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    }
}
