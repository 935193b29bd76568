// src/ingest/mod.rs
//! Ingestion pipeline: payload -> rows -> normalize -> dedup-resolve -> tally
//! -> finalized execution.

pub mod dedup;
pub mod normalize;
pub mod rows;
pub mod scrape;

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::time::Instant;

use crate::model::{
    ActorId, Execution, LeadId, NewExecution, RowError, Scope, EXECUTION_FAILURE,
    EXECUTION_SUCCESS,
};
use crate::notify::MeetingNotifier;
use crate::store::{ExecutionStore, LeadStore};
use normalize::{normalize, NormalizeContext};
use rows::ParsedRow;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingestion runs started.");
        describe_counter!("ingest_rows_total", "Rows seen across all runs.");
        describe_counter!(
            "ingest_leads_created_total",
            "Leads newly created by ingestion."
        );
        describe_counter!(
            "ingest_row_errors_total",
            "Rows skipped because they could not be parsed or stored."
        );
        describe_histogram!("ingest_run_ms", "Ingestion run time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts of the last finished run.");
    });
}

/// Where a batch goes and how its execution is labelled.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub scope: Scope,
    /// Actor who started the run, recorded on the execution.
    pub created_by: Option<ActorId>,
    pub query: Option<String>,
    pub location: Option<String>,
    /// Source tag for rows that do not carry their own.
    pub source: Option<String>,
    pub name: Option<String>,
    /// Keep the raw payload on the execution for replay/audit.
    pub retain_payload: bool,
}

impl IngestRequest {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            created_by: None,
            query: None,
            location: None,
            source: None,
            name: None,
            retain_payload: false,
        }
    }

    fn context(&self) -> NormalizeContext {
        NormalizeContext {
            query: self.query.clone(),
            location: self.location.clone(),
            source: self.source.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Created,
    Existing,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowOutcome {
    pub row: usize,
    pub status: RowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<LeadId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub execution: Execution,
    pub rows: Vec<RowOutcome>,
}

impl IngestReport {
    fn count(&self, status: RowStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    pub fn created(&self) -> usize {
        self.count(RowStatus::Created)
    }

    pub fn existing(&self) -> usize {
        self.count(RowStatus::Existing)
    }

    pub fn errors(&self) -> usize {
        self.count(RowStatus::Error)
    }
}

/// Ingest a raw CSV payload. Store failures creating or finalizing the
/// execution fail the call; everything row-level is recorded instead.
pub async fn ingest_csv<S>(
    store: &S,
    notifier: &MeetingNotifier,
    req: IngestRequest,
    bytes: &[u8],
) -> Result<IngestReport>
where
    S: LeadStore + ExecutionStore + ?Sized,
{
    let payload = req
        .retain_payload
        .then(|| String::from_utf8_lossy(bytes).into_owned());
    let execution = start(store, &req, payload).await?;

    match rows::parse_csv(bytes) {
        Ok(parsed) => run(store, notifier, &req, execution, parsed).await,
        Err(e) => {
            tracing::warn!(target: "ingest", execution_id = execution.id, error = %e, "CSV payload unreadable");
            let errors = vec![RowError {
                row: 0,
                business_name: None,
                error: format!("{e:#}"),
            }];
            let execution = finish(store, execution, 0, EXECUTION_FAILURE, errors).await?;
            Ok(IngestReport {
                execution,
                rows: Vec::new(),
            })
        }
    }
}

/// Ingest caller-supplied records (JSON array elements).
pub async fn ingest_records<S>(
    store: &S,
    notifier: &MeetingNotifier,
    req: IngestRequest,
    records: &[serde_json::Value],
) -> Result<IngestReport>
where
    S: LeadStore + ExecutionStore + ?Sized,
{
    let payload = if req.retain_payload {
        Some(serde_json::to_string(records)?)
    } else {
        None
    };
    let execution = start(store, &req, payload).await?;
    let parsed = rows::parse_json_records(records);
    run(store, notifier, &req, execution, parsed).await
}

async fn start<S>(store: &S, req: &IngestRequest, payload: Option<String>) -> Result<Execution>
where
    S: ExecutionStore + ?Sized,
{
    ensure_metrics_described();
    counter!("ingest_runs_total").increment(1);
    store
        .create_execution(NewExecution {
            name: req.name.clone(),
            query: req.query.clone(),
            location: req.location.clone(),
            payload,
            ..NewExecution::new(req.scope, req.created_by)
        })
        .await
}

async fn run<S>(
    store: &S,
    notifier: &MeetingNotifier,
    req: &IngestRequest,
    execution: Execution,
    parsed: Vec<ParsedRow>,
) -> Result<IngestReport>
where
    S: LeadStore + ExecutionStore + ?Sized,
{
    let started = Instant::now();
    let ctx = req.context();
    let mut outcomes = Vec::with_capacity(parsed.len());
    let mut errors = Vec::new();

    for (idx, row) in parsed.into_iter().enumerate() {
        let row_no = idx + 1;
        let outcome = match row {
            Err(reason) => RowOutcome {
                row: row_no,
                status: RowStatus::Error,
                lead_id: None,
                business_name: None,
                error: Some(reason),
            },
            Ok(record) => {
                let draft = normalize(&record, &ctx);
                let name = draft.business_name.clone();
                match dedup::resolve(store, req.scope, draft).await {
                    Ok(res) => {
                        if res.created {
                            notifier.notify(&res.lead);
                        }
                        RowOutcome {
                            row: row_no,
                            status: if res.created {
                                RowStatus::Created
                            } else {
                                RowStatus::Existing
                            },
                            lead_id: Some(res.lead.id),
                            business_name: Some(name),
                            error: None,
                        }
                    }
                    Err(e) => RowOutcome {
                        row: row_no,
                        status: RowStatus::Error,
                        lead_id: None,
                        business_name: Some(name),
                        error: Some(format!("{e:#}")),
                    },
                }
            }
        };
        if outcome.status == RowStatus::Error {
            errors.push(RowError {
                row: outcome.row,
                business_name: outcome.business_name.clone(),
                error: outcome.error.clone().unwrap_or_default(),
            });
        }
        outcomes.push(outcome);
    }

    let created = outcomes
        .iter()
        .filter(|o| o.status == RowStatus::Created)
        .count() as u64;
    counter!("ingest_rows_total").increment(outcomes.len() as u64);
    counter!("ingest_leads_created_total").increment(created);
    counter!("ingest_row_errors_total").increment(errors.len() as u64);
    histogram!("ingest_run_ms").record(started.elapsed().as_secs_f64() * 1000.0);

    tracing::info!(
        target: "ingest",
        execution_id = execution.id,
        scope = %req.scope,
        rows = outcomes.len(),
        created,
        errors = errors.len(),
        "ingest run finished"
    );

    let execution = finish(store, execution, created, EXECUTION_SUCCESS, errors).await?;
    Ok(IngestReport {
        execution,
        rows: outcomes,
    })
}

async fn finish<S>(
    store: &S,
    execution: Execution,
    created: u64,
    status: &str,
    errors: Vec<RowError>,
) -> Result<Execution>
where
    S: ExecutionStore + ?Sized,
{
    gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
    let id = execution.id;
    Ok(store
        .finalize_execution(id, created, status, errors.clone())
        .await?
        .unwrap_or(Execution {
            leads_generated: created,
            status: status.to_string(),
            errors,
            ..execution
        }))
}
