// src/api/executions.rs
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use super::{ApiJson, ApiPath, AppState, CurrentActor};
use crate::error::{CrmError, CrmResult};
use crate::model::{Execution, ExecutionId, NewExecution, EXECUTION_SUCCESS};
use crate::policy::ScopeRequest;
use crate::store::ExecutionStore;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct CreateExecutionBody {
    name: Option<String>,
    query: Option<String>,
    location: Option<String>,
    status: Option<String>,
    leads_generated: u64,
    payload: Option<String>,
    target_scope: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct UpdateExecutionBody {
    name: Option<String>,
    payload: Option<String>,
}

fn not_found() -> CrmError {
    CrmError::NotFound("Execution not found".into())
}

async fn load(state: &AppState, id: ExecutionId) -> CrmResult<Execution> {
    state.store.get_execution(id).await?.ok_or_else(not_found)
}

/// Newest first, only the runs the caller may see; payloads are only returned
/// by the single-record route.
pub(super) async fn list(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> CrmResult<Json<Vec<Execution>>> {
    let list = state
        .store
        .list_executions()
        .await?
        .into_iter()
        .filter(|e| state.policy.may_view_execution(&actor, e))
        .map(Execution::without_payload)
        .collect();
    Ok(Json(list))
}

/// Manual record of a run that happened elsewhere, so it is finished already.
pub(super) async fn create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(body): ApiJson<CreateExecutionBody>,
) -> CrmResult<(StatusCode, Json<Execution>)> {
    let scope = state
        .policy
        .resolve_target(&actor, ScopeRequest::parse(body.target_scope.as_deref())?)?;
    let status = body
        .status
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| EXECUTION_SUCCESS.to_string());
    let execution = state
        .store
        .create_execution(NewExecution {
            name: body.name,
            query: body.query,
            location: body.location,
            status: Some(status),
            leads_generated: body.leads_generated,
            payload: body.payload,
            ..NewExecution::new(scope, Some(actor.id))
        })
        .await?;
    tracing::info!(target: "api", actor_id = actor.id, execution_id = execution.id, %scope, "execution recorded");
    Ok((StatusCode::CREATED, Json(execution)))
}

pub(super) async fn get_one(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<ExecutionId>,
) -> CrmResult<Json<Execution>> {
    let execution = load(&state, id).await?;
    state.policy.authorize_execution_view(&actor, &execution)?;
    Ok(Json(execution))
}

pub(super) async fn update(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<ExecutionId>,
    ApiJson(body): ApiJson<UpdateExecutionBody>,
) -> CrmResult<Json<Execution>> {
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(CrmError::Validation("Execution name cannot be empty".into()));
    }
    let existing = load(&state, id).await?;
    state.policy.authorize_execution_modify(&actor, &existing)?;
    state
        .store
        .update_execution(id, body.name, body.payload)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}
