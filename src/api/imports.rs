// src/api/imports.rs
//! Batch routes: JSON bulk, raw CSV import, CSV export and webhook lead-gen.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;
use serde::Deserialize;

use super::{ApiJson, ApiQuery, AppState, CurrentActor, ScopeQuery};
use crate::error::{CrmError, CrmResult};
use crate::ingest::{self, rows, IngestReport, IngestRequest};
use crate::model::{Actor, NewExecution, RowError, Scope, EXECUTION_FAILURE};
use crate::policy::ScopeRequest;
use crate::store::{ExecutionStore, LeadFilter, LeadStore};

#[derive(Debug, Default, Deserialize)]
pub(super) struct IngestQuery {
    scope: Option<String>,
    query: Option<String>,
    location: Option<String>,
    source: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LeadGenBody {
    #[serde(default)]
    query: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    target_scope: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl IngestQuery {
    fn into_request(self, state: &AppState, actor: &Actor) -> CrmResult<IngestRequest> {
        let scope = state
            .policy
            .resolve_target(actor, ScopeRequest::parse(self.scope.as_deref())?)?;
        Ok(IngestRequest {
            query: non_blank(self.query),
            location: non_blank(self.location),
            source: non_blank(self.source),
            name: non_blank(self.name),
            created_by: Some(actor.id),
            ..IngestRequest::new(scope)
        })
    }
}

fn log_report(actor: &Actor, route: &'static str, report: &IngestReport) {
    tracing::info!(
        target: "api",
        actor_id = actor.id,
        route,
        execution_id = report.execution.id,
        created = report.created(),
        existing = report.existing(),
        errors = report.errors(),
        "batch ingested"
    );
}

/// JSON array of loosely-shaped records.
pub(super) async fn bulk(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(q): ApiQuery<IngestQuery>,
    ApiJson(records): ApiJson<Vec<serde_json::Value>>,
) -> CrmResult<Json<IngestReport>> {
    let req = q.into_request(&state, &actor)?;
    let report = ingest::ingest_records(&*state.store, &state.notifier, req, &records).await?;
    log_report(&actor, "bulk", &report);
    Ok(Json(report))
}

/// Raw CSV body with a header row.
pub(super) async fn import_csv(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(q): ApiQuery<IngestQuery>,
    body: Bytes,
) -> CrmResult<Json<IngestReport>> {
    let req = q.into_request(&state, &actor)?;
    let report = ingest::ingest_csv(&*state.store, &state.notifier, req, &body).await?;
    log_report(&actor, "import", &report);
    Ok(Json(report))
}

fn csv_attachment(body: Vec<u8>, filename: &str) -> (HeaderMap, Vec<u8>) {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    if let Ok(v) = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, v);
    }
    (headers, body)
}

/// Visible leads in the same column layout `import` accepts.
pub(super) async fn export_csv(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(q): ApiQuery<ScopeQuery>,
) -> CrmResult<Response> {
    let view = state
        .policy
        .resolve_read(&actor, q.request()?, q.target_user_id)?;
    let leads = state
        .store
        .list_leads(&LeadFilter {
            view,
            status: q.status(),
        })
        .await?;
    let body = rows::leads_to_csv(&leads)?;
    Ok(csv_attachment(body, "leads.csv").into_response())
}

async fn record_scrape_failure(
    state: &AppState,
    req: &IngestRequest,
    reason: &str,
) -> CrmResult<()> {
    let execution = state
        .store
        .create_execution(NewExecution {
            query: req.query.clone(),
            location: req.location.clone(),
            ..NewExecution::new(req.scope, req.created_by)
        })
        .await?;
    state
        .store
        .finalize_execution(
            execution.id,
            0,
            EXECUTION_FAILURE,
            vec![RowError {
                row: 0,
                business_name: None,
                error: reason.to_string(),
            }],
        )
        .await?;
    Ok(())
}

/// Calls the scrape webhook, ingests what it returns and hands the CSV back.
pub(super) async fn lead_gen(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(body): ApiJson<LeadGenBody>,
) -> CrmResult<Response> {
    let query = body.query.trim();
    let location = body.location.trim();
    if query.is_empty() || location.is_empty() {
        return Err(CrmError::Validation("Query and location are required".into()));
    }
    let scope: Scope = state
        .policy
        .resolve_target(&actor, ScopeRequest::parse(body.target_scope.as_deref())?)?;

    let req = IngestRequest {
        query: Some(query.to_string()),
        location: Some(location.to_string()),
        created_by: Some(actor.id),
        retain_payload: true,
        ..IngestRequest::new(scope)
    };

    let csv = match state.scraper.fetch_csv(query, location).await {
        Ok(bytes) => bytes,
        Err(e) => {
            counter!("scrape_failures_total").increment(1);
            tracing::warn!(
                target: "ingest",
                provider = state.scraper.name(),
                error = %e,
                "scrape webhook failed"
            );
            let reason = format!("{e:#}");
            record_scrape_failure(&state, &req, &reason).await?;
            return Err(CrmError::Upstream(reason));
        }
    };

    let report = ingest::ingest_csv(&*state.store, &state.notifier, req, &csv).await?;
    log_report(&actor, "lead-gen", &report);

    let filename = format!("leads_{}.csv", report.execution.id);
    let (mut headers, bytes) = csv_attachment(csv, &filename);
    headers.insert("x-execution-id", HeaderValue::from(report.execution.id));
    headers.insert(
        "x-leads-generated",
        HeaderValue::from(report.execution.leads_generated),
    );
    Ok((StatusCode::OK, headers, bytes).into_response())
}
