//! Lead CRM service: binary entrypoint.
//! Boots the Axum HTTP server with config, store, providers and metrics.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lead_crm::config::CrmConfig;
use lead_crm::metrics::Metrics;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lead_crm=info,warn"));

    // Shuttle may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = CrmConfig::load_default().context("loading CRM config")?;
    let store = lead_crm::open_store(&cfg)?;
    let state = lead_crm::build_state(&cfg, store).await?;

    let metrics = match Metrics::install() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(error = ?e, "metrics exporter not installed; /metrics disabled");
            None
        }
    };

    tracing::info!(
        snapshot = ?cfg.snapshot_path,
        scraper = state.scraper.name(),
        calendar = state.notifier.is_enabled(),
        "lead CRM ready"
    );

    let router = lead_crm::app(state, metrics.as_ref());
    Ok(router.into())
}
