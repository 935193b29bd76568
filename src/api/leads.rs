// src/api/leads.rs
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiJson, ApiPath, ApiQuery, AppState, CurrentActor, ScopeQuery};
use crate::error::{CrmError, CrmResult};
use crate::model::{Lead, LeadDraft, LeadId, LeadPatch, NEW_LEAD_BUSINESS_NAME};
use crate::policy::ScopeRequest;
use crate::store::{LeadFilter, LeadStore, StatusStats};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateLeadBody {
    #[serde(default)]
    target_scope: Option<String>,
    #[serde(flatten)]
    draft: LeadDraft,
}

pub(super) async fn list(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(q): ApiQuery<ScopeQuery>,
) -> CrmResult<Json<Vec<Lead>>> {
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
    Ok(Json(leads))
}

/// Direct creation. No dedup here, unlike batch ingestion.
pub(super) async fn create(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(body): ApiJson<CreateLeadBody>,
) -> CrmResult<(StatusCode, Json<Lead>)> {
    let request = ScopeRequest::parse(body.target_scope.as_deref())?;
    let scope = state.policy.resolve_target(&actor, request)?;

    let mut draft = body.draft;
    draft.business_name = match draft.business_name.trim() {
        "" => NEW_LEAD_BUSINESS_NAME.to_string(),
        name => name.to_string(),
    };
    let lead = state.store.insert_lead(scope, draft).await?;
    tracing::info!(target: "api", actor_id = actor.id, lead_id = lead.id, %scope, "lead created");
    state.notifier.notify(&lead);
    Ok((StatusCode::CREATED, Json(lead)))
}

pub(super) async fn update(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<LeadId>,
    ApiJson(patch): ApiJson<LeadPatch>,
) -> CrmResult<Json<Lead>> {
    let existing = state
        .store
        .get_lead(id)
        .await?
        .ok_or_else(CrmError::lead_not_found)?;
    state.policy.authorize_modify(&actor, existing.scope)?;

    let sets_meeting = patch.sets_meeting_date();
    let updated = state
        .store
        .update_lead(id, patch)
        .await?
        .ok_or_else(CrmError::lead_not_found)?;
    if sets_meeting {
        state.notifier.notify(&updated);
    }
    Ok(Json(updated))
}

pub(super) async fn remove(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<LeadId>,
) -> CrmResult<Json<Value>> {
    let existing = state
        .store
        .get_lead(id)
        .await?
        .ok_or_else(CrmError::lead_not_found)?;
    state.policy.authorize_modify(&actor, existing.scope)?;
    if !state.store.delete_lead(id).await? {
        return Err(CrmError::lead_not_found());
    }
    tracing::info!(target: "api", actor_id = actor.id, lead_id = id, "lead deleted");
    Ok(Json(json!({ "message": "Lead deleted" })))
}

pub(super) async fn stats(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiQuery(q): ApiQuery<ScopeQuery>,
) -> CrmResult<Json<StatusStats>> {
    let view = state
        .policy
        .resolve_read(&actor, q.request()?, q.target_user_id)?;
    Ok(Json(state.store.status_counts(&view).await?))
}
