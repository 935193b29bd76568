// src/store/memory.rs
//! In-process store behind a single mutex, optionally mirrored to a JSON
//! snapshot file after every mutation.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{ActorStore, ExecutionStore, LeadFilter, LeadStore, StatusStats};
use crate::ingest::dedup::DedupKey;
use crate::model::{
    Actor, ActorId, ActorRecord, Execution, ExecutionId, Lead, LeadDraft, LeadId, LeadPatch,
    NewActor, NewExecution, RowError, Scope,
};
use crate::policy::ScopeView;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct State {
    next_lead_id: LeadId,
    next_execution_id: ExecutionId,
    next_actor_id: ActorId,
    leads: BTreeMap<LeadId, Lead>,
    executions: BTreeMap<ExecutionId, Execution>,
    actors: BTreeMap<ActorId, ActorRecord>,
}

impl State {
    fn alloc_lead_id(&mut self) -> LeadId {
        self.next_lead_id += 1;
        self.next_lead_id
    }

    fn push_lead(&mut self, scope: Scope, draft: LeadDraft) -> Lead {
        let id = self.alloc_lead_id();
        let lead = draft.into_lead(id, scope, Utc::now());
        self.leads.insert(id, lead.clone());
        lead
    }

    fn alloc_execution_id(&mut self) -> ExecutionId {
        self.next_execution_id += 1;
        self.next_execution_id
    }

    fn alloc_actor_id(&mut self) -> ActorId {
        self.next_actor_id += 1;
        self.next_actor_id
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    snapshot: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl MemoryStore {
    /// Volatile store, used by tests and when no snapshot path is configured.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(State::default()),
            snapshot: None,
        }
    }

    /// Opens the store, loading `path` if it already exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("reading snapshot {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing snapshot {}", path.display()))?
        } else {
            State::default()
        };
        tracing::info!(
            target: "store",
            path = %path.display(),
            leads = state.leads.len(),
            actors = state.actors.len(),
            "store opened"
        );
        Ok(Self {
            state: Mutex::new(state),
            snapshot: Some(path),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("store mutex poisoned"))
    }

    /// Applies `change` under the held lock. With a snapshot configured the
    /// change runs on a copy that replaces the live state only after the
    /// snapshot write succeeded, so a failed write leaves nothing behind.
    fn commit<T>(&self, st: &mut State, change: impl FnOnce(&mut State) -> T) -> Result<T> {
        let Some(path) = &self.snapshot else {
            return Ok(change(st));
        };
        let mut next = st.clone();
        let out = change(&mut next);
        write_atomic(path, &next)?;
        *st = next;
        Ok(out)
    }
}

fn write_atomic(path: &Path, state: &State) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(state).context("serializing snapshot")?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

fn newest_first(a: &Lead, b: &Lead) -> std::cmp::Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

#[async_trait::async_trait]
impl LeadStore for MemoryStore {
    async fn find_or_create(
        &self,
        scope: Scope,
        key: &DedupKey,
        draft: LeadDraft,
    ) -> Result<(Lead, bool)> {
        let mut st = self.lock()?;
        if let Some(existing) = st
            .leads
            .values()
            .find(|l| l.scope == scope && key.matches(l))
        {
            return Ok((existing.clone(), false));
        }
        let lead = self.commit(&mut st, |s| s.push_lead(scope, draft))?;
        Ok((lead, true))
    }

    async fn insert_lead(&self, scope: Scope, draft: LeadDraft) -> Result<Lead> {
        let mut st = self.lock()?;
        self.commit(&mut st, |s| s.push_lead(scope, draft))
    }

    async fn get_lead(&self, id: LeadId) -> Result<Option<Lead>> {
        Ok(self.lock()?.leads.get(&id).cloned())
    }

    async fn update_lead(&self, id: LeadId, patch: LeadPatch) -> Result<Option<Lead>> {
        let mut st = self.lock()?;
        if !st.leads.contains_key(&id) {
            return Ok(None);
        }
        self.commit(&mut st, |s| {
            s.leads.get_mut(&id).map(|lead| {
                patch.apply(lead, Utc::now());
                lead.clone()
            })
        })
    }

    async fn delete_lead(&self, id: LeadId) -> Result<bool> {
        let mut st = self.lock()?;
        if !st.leads.contains_key(&id) {
            return Ok(false);
        }
        self.commit(&mut st, |s| s.leads.remove(&id).is_some())
    }

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>> {
        let st = self.lock()?;
        let mut out: Vec<Lead> = st
            .leads
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        out.sort_by(newest_first);
        Ok(out)
    }

    async fn status_counts(&self, view: &ScopeView) -> Result<StatusStats> {
        let st = self.lock()?;
        let mut stats = StatusStats::default();
        for lead in st.leads.values().filter(|l| view.contains(l.scope)) {
            stats.total += 1;
            *stats.breakdown.entry(lead.status.clone()).or_default() += 1;
        }
        Ok(stats)
    }
}

#[async_trait::async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(&self, new: NewExecution) -> Result<Execution> {
        let mut st = self.lock()?;
        self.commit(&mut st, |s| {
            let id = s.alloc_execution_id();
            let exec = Execution {
                id,
                name: new.display_name(),
                query: new.query,
                location: new.location,
                date: Utc::now(),
                leads_generated: new.leads_generated,
                status: new
                    .status
                    .unwrap_or_else(|| crate::model::EXECUTION_IN_PROGRESS.to_string()),
                payload: new.payload,
                errors: Vec::new(),
                scope: new.scope,
                created_by: new.created_by,
            };
            s.executions.insert(id, exec.clone());
            exec
        })
    }

    async fn finalize_execution(
        &self,
        id: ExecutionId,
        leads_generated: u64,
        status: &str,
        errors: Vec<RowError>,
    ) -> Result<Option<Execution>> {
        let mut st = self.lock()?;
        if !st.executions.contains_key(&id) {
            return Ok(None);
        }
        self.commit(&mut st, |s| {
            s.executions.get_mut(&id).map(|exec| {
                exec.leads_generated = leads_generated;
                exec.status = status.to_string();
                exec.errors = errors;
                exec.clone()
            })
        })
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>> {
        Ok(self.lock()?.executions.get(&id).cloned())
    }

    async fn list_executions(&self) -> Result<Vec<Execution>> {
        let st = self.lock()?;
        let mut out: Vec<Execution> = st.executions.values().cloned().collect();
        out.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn update_execution(
        &self,
        id: ExecutionId,
        name: Option<String>,
        payload: Option<String>,
    ) -> Result<Option<Execution>> {
        let mut st = self.lock()?;
        if !st.executions.contains_key(&id) {
            return Ok(None);
        }
        self.commit(&mut st, |s| {
            s.executions.get_mut(&id).map(|exec| {
                if let Some(n) = name.filter(|n| !n.trim().is_empty()) {
                    exec.name = n;
                }
                if let Some(p) = payload {
                    exec.payload = Some(p);
                }
                exec.clone()
            })
        })
    }
}

#[async_trait::async_trait]
impl ActorStore for MemoryStore {
    async fn create_actor(&self, new: NewActor) -> Result<Option<ActorRecord>> {
        let mut st = self.lock()?;
        let email = new.email.trim().to_string();
        if st
            .actors
            .values()
            .any(|a| a.actor.email.eq_ignore_ascii_case(&email))
        {
            return Ok(None);
        }
        self.commit(&mut st, |s| {
            let id = s.alloc_actor_id();
            let rec = ActorRecord {
                actor: Actor {
                    id,
                    name: new.name,
                    email,
                    role: new.role,
                    shared_pool_access: new.shared_pool_access,
                },
                credential_hash: new.credential_hash,
            };
            s.actors.insert(id, rec.clone());
            Some(rec)
        })
    }

    async fn get_actor(&self, id: ActorId) -> Result<Option<ActorRecord>> {
        Ok(self.lock()?.actors.get(&id).cloned())
    }

    async fn find_actor_by_email(&self, email: &str) -> Result<Option<ActorRecord>> {
        let email = email.trim();
        Ok(self
            .lock()?
            .actors
            .values()
            .find(|a| a.actor.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list_actors(&self) -> Result<Vec<Actor>> {
        Ok(self
            .lock()?
            .actors
            .values()
            .map(|a| a.actor.clone())
            .collect())
    }

    async fn set_shared_pool_access(&self, id: ActorId, allowed: bool) -> Result<Option<Actor>> {
        let mut st = self.lock()?;
        if !st.actors.contains_key(&id) {
            return Ok(None);
        }
        self.commit(&mut st, |s| {
            s.actors.get_mut(&id).map(|rec| {
                rec.actor.shared_pool_access = allowed;
                rec.actor.clone()
            })
        })
    }

    async fn delete_actor(&self, id: ActorId) -> Result<Option<usize>> {
        let mut st = self.lock()?;
        if !st.actors.contains_key(&id) {
            return Ok(None);
        }
        self.commit(&mut st, |s| {
            s.actors.remove(&id);
            let before = s.leads.len();
            s.leads.retain(|_, l| l.scope != Scope::Actor(id));
            Some(before - s.leads.len())
        })
    }
}
