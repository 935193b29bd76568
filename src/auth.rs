// src/auth.rs
//! Authentication provider: accounts, login and bearer-session verification.
//! Credential hashes are opaque to the rest of the crate.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::{CrmError, CrmResult};
use crate::model::{Actor, ActorId, NewActor, Role};
use crate::store::ActorStore;

/// Hex SHA-256 over the lowercased email and the password.
///
/// This is an equality fingerprint, not a password KDF: there is no salt and
/// no work factor, so do not reuse it where offline guessing matters.
pub fn hash_credential(email: &str, password: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_ascii_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Pulls the token out of an `Authorization: Bearer <token>` value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let value = header?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub shared_pool_access: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Session {
    pub token: String,
    pub user: Actor,
}

#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
    async fn register(&self, account: NewAccount) -> CrmResult<Actor>;
    async fn login(&self, email: &str, password: &str) -> CrmResult<Session>;
    /// Resolves a bearer token to the actor as currently stored.
    async fn verify(&self, token: &str) -> CrmResult<Actor>;
    /// Drops every session of an actor (after deletion).
    fn revoke_actor(&self, actor_id: ActorId);
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    actor_id: ActorId,
    expires_at: DateTime<Utc>,
}

/// Opaque random tokens kept in memory with a fixed lifetime.
pub struct SessionAuth<S: ActorStore + ?Sized> {
    store: Arc<S>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    ttl: ChronoDuration,
}

impl<S: ActorStore + ?Sized> SessionAuth<S> {
    pub fn new(store: Arc<S>, ttl_hours: i64) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
            ttl: ChronoDuration::hours(ttl_hours.max(1)),
        }
    }

    fn issue(&self, actor_id: ActorId, now: DateTime<Utc>) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut map = match self.sessions.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        map.retain(|_, s| s.expires_at > now);
        map.insert(
            token.clone(),
            SessionEntry {
                actor_id,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    fn lookup(&self, token: &str, now: DateTime<Utc>) -> Option<ActorId> {
        let mut map = match self.sessions.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        let entry = *map.get(token)?;
        if entry.expires_at <= now {
            map.remove(token);
            return None;
        }
        Some(entry.actor_id)
    }

    /// Creates the configured HR account unless that email already exists.
    pub async fn ensure_bootstrap_hr(
        &self,
        name: Option<&str>,
        email: &str,
        password: &str,
    ) -> CrmResult<()> {
        if self.store.find_actor_by_email(email).await?.is_some() {
            return Ok(());
        }
        let actor = self
            .register(NewAccount {
                name: name.unwrap_or("Administrator").to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: Role::Hr,
                shared_pool_access: true,
            })
            .await?;
        tracing::info!(target: "auth", actor_id = actor.id, "bootstrap HR account created");
        Ok(())
    }

    #[cfg(test)]
    fn expire_all(&self) {
        let mut map = self.sessions.lock().unwrap();
        for s in map.values_mut() {
            s.expires_at = Utc::now() - ChronoDuration::seconds(1);
        }
    }
}

#[async_trait::async_trait]
impl<S: ActorStore + ?Sized> AuthProvider for SessionAuth<S> {
    async fn register(&self, account: NewAccount) -> CrmResult<Actor> {
        let name = account.name.trim();
        let email = account.email.trim();
        if name.is_empty() || email.is_empty() || account.password.is_empty() {
            return Err(CrmError::Validation("Missing required fields".into()));
        }
        let created = self
            .store
            .create_actor(NewActor {
                name: name.to_string(),
                email: email.to_string(),
                credential_hash: hash_credential(email, &account.password),
                role: account.role,
                shared_pool_access: account.shared_pool_access,
            })
            .await?;
        created
            .map(|rec| rec.actor)
            .ok_or_else(|| CrmError::Conflict("Email already exists".into()))
    }

    async fn login(&self, email: &str, password: &str) -> CrmResult<Session> {
        let denied = || CrmError::InvalidCredentials("Invalid credentials".into());
        let Some(rec) = self.store.find_actor_by_email(email).await? else {
            tracing::debug!(target: "auth", "login for unknown email");
            return Err(denied());
        };
        if rec.credential_hash != hash_credential(&rec.actor.email, password) {
            tracing::debug!(target: "auth", actor_id = rec.actor.id, "login with wrong password");
            return Err(denied());
        }
        let token = self.issue(rec.actor.id, Utc::now());
        Ok(Session {
            token,
            user: rec.actor,
        })
    }

    async fn verify(&self, token: &str) -> CrmResult<Actor> {
        let invalid = || CrmError::InvalidCredentials("invalid or expired token".into());
        let actor_id = self.lookup(token, Utc::now()).ok_or_else(invalid)?;
        match self.store.get_actor(actor_id).await? {
            Some(rec) => Ok(rec.actor),
            None => {
                self.revoke_actor(actor_id);
                Err(invalid())
            }
        }
    }

    fn revoke_actor(&self, actor_id: ActorId) {
        let mut map = match self.sessions.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        map.retain(|_, s| s.actor_id != actor_id);
    }
}
