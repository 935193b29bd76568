// src/store/mod.rs
//! Persistence seam. Handlers and the ingestion pipeline only see these
//! traits; `MemoryStore` is the implementation wired by the binary.

pub mod memory;

use anyhow::Result;
use std::collections::BTreeMap;

use crate::ingest::dedup::DedupKey;
use crate::model::{
    Actor, ActorId, ActorRecord, Execution, ExecutionId, Lead, LeadDraft, LeadId, LeadPatch,
    NewActor, NewExecution, RowError, Scope,
};
use crate::policy::ScopeView;

pub use memory::MemoryStore;

/// Scoped list query. Results are ordered newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeadFilter {
    pub view: ScopeView,
    pub status: Option<String>,
}

impl LeadFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        self.view.contains(lead.scope)
            && self
                .status
                .as_deref()
                .is_none_or(|s| lead.status == s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusStats {
    pub total: u64,
    pub breakdown: BTreeMap<String, u64>,
}

#[async_trait::async_trait]
pub trait LeadStore: Send + Sync {
    /// Atomic per key: returns the lead matching `key` inside `scope`, or
    /// inserts `draft` there. The bool is `true` when a lead was created.
    async fn find_or_create(
        &self,
        scope: Scope,
        key: &DedupKey,
        draft: LeadDraft,
    ) -> Result<(Lead, bool)>;

    /// Unconditional insert (direct creation, no dedup).
    async fn insert_lead(&self, scope: Scope, draft: LeadDraft) -> Result<Lead>;

    async fn get_lead(&self, id: LeadId) -> Result<Option<Lead>>;

    async fn update_lead(&self, id: LeadId, patch: LeadPatch) -> Result<Option<Lead>>;

    async fn delete_lead(&self, id: LeadId) -> Result<bool>;

    async fn list_leads(&self, filter: &LeadFilter) -> Result<Vec<Lead>>;

    async fn status_counts(&self, view: &ScopeView) -> Result<StatusStats>;
}

#[async_trait::async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(&self, new: NewExecution) -> Result<Execution>;

    /// Records the outcome of a run. Returns `None` for an unknown id.
    async fn finalize_execution(
        &self,
        id: ExecutionId,
        leads_generated: u64,
        status: &str,
        errors: Vec<RowError>,
    ) -> Result<Option<Execution>>;

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<Execution>>;

    /// Newest first.
    async fn list_executions(&self) -> Result<Vec<Execution>>;

    async fn update_execution(
        &self,
        id: ExecutionId,
        name: Option<String>,
        payload: Option<String>,
    ) -> Result<Option<Execution>>;
}

#[async_trait::async_trait]
pub trait ActorStore: Send + Sync {
    /// `None` when the email is already registered (case-insensitive).
    async fn create_actor(&self, new: NewActor) -> Result<Option<ActorRecord>>;

    async fn get_actor(&self, id: ActorId) -> Result<Option<ActorRecord>>;

    async fn find_actor_by_email(&self, email: &str) -> Result<Option<ActorRecord>>;

    async fn list_actors(&self) -> Result<Vec<Actor>>;

    async fn set_shared_pool_access(&self, id: ActorId, allowed: bool) -> Result<Option<Actor>>;

    /// Deletes the actor and every lead in its scope. Returns the number of
    /// cascaded leads, or `None` for an unknown id.
    async fn delete_actor(&self, id: ActorId) -> Result<Option<usize>>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: LeadStore + ExecutionStore + ActorStore {}

impl<T: LeadStore + ExecutionStore + ActorStore> Store for T {}
