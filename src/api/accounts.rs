// src/api/accounts.rs
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiJson, ApiPath, AppState, CurrentActor};
use crate::auth::{NewAccount, Session};
use crate::error::{CrmError, CrmResult};
use crate::model::{Actor, ActorId, Role};
use crate::store::ActorStore;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RegisterBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateUserBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: Role,
    #[serde(default)]
    shared_pool_access: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AccessBody {
    shared_pool_access: bool,
}

/// Self-registration always yields an Intern without shared-pool access.
pub(super) async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterBody>,
) -> CrmResult<(StatusCode, Json<Value>)> {
    let user = state
        .auth
        .register(NewAccount {
            name: body.name,
            email: body.email,
            password: body.password,
            role: Role::Intern,
            shared_pool_access: false,
        })
        .await?;
    tracing::info!(target: "auth", actor_id = user.id, "account registered");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User registered successfully", "user": user })),
    ))
}

pub(super) async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> CrmResult<Json<Session>> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(CrmError::Validation("Email and password are required".into()));
    }
    let session = state.auth.login(body.email.trim(), &body.password).await?;
    tracing::info!(target: "auth", actor_id = session.user.id, "login");
    Ok(Json(session))
}

pub(super) async fn create_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiJson(body): ApiJson<CreateUserBody>,
) -> CrmResult<(StatusCode, Json<Actor>)> {
    state.policy.require_privileged(&actor)?;
    let user = state
        .auth
        .register(NewAccount {
            name: body.name,
            email: body.email,
            password: body.password,
            role: body.role,
            shared_pool_access: body.shared_pool_access,
        })
        .await?;
    tracing::info!(target: "auth", by = actor.id, actor_id = user.id, role = ?user.role, "account created");
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> CrmResult<Json<Vec<Actor>>> {
    state.policy.require_privileged(&actor)?;
    Ok(Json(state.store.list_actors().await?))
}

pub(super) async fn set_access(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<ActorId>,
    ApiJson(body): ApiJson<AccessBody>,
) -> CrmResult<Json<Actor>> {
    state.policy.require_privileged(&actor)?;
    let updated = state
        .store
        .set_shared_pool_access(id, body.shared_pool_access)
        .await?
        .ok_or_else(|| CrmError::NotFound("User not found".into()))?;
    tracing::info!(
        target: "auth",
        by = actor.id,
        actor_id = id,
        shared_pool_access = body.shared_pool_access,
        "shared pool access changed"
    );
    Ok(Json(updated))
}

/// Removes the account, its personal leads and its sessions.
pub(super) async fn delete_user(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ApiPath(id): ApiPath<ActorId>,
) -> CrmResult<Json<Value>> {
    state.policy.require_privileged(&actor)?;
    if id == actor.id {
        return Err(CrmError::Validation("Cannot delete your own account".into()));
    }
    let cascaded = state
        .store
        .delete_actor(id)
        .await?
        .ok_or_else(|| CrmError::NotFound("User not found".into()))?;
    state.auth.revoke_actor(id);
    tracing::info!(target: "auth", by = actor.id, actor_id = id, leads_deleted = cascaded, "account deleted");
    Ok(Json(json!({ "message": "User deleted", "leadsDeleted": cascaded })))
}
