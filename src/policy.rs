// src/policy.rs
//! Visibility and authorization rules for leads and execution records. Every
//! user-initiated read, write and delete goes through `VisibilityPolicy`;
//! batch ingestion only uses it to pick the target scope.

use crate::error::{CrmError, CrmResult};
use crate::model::{Actor, ActorId, Execution, Scope};

/// Result of resolving a read request to a set of scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeView {
    One(Scope),
    All,
}

impl ScopeView {
    pub fn contains(&self, scope: Scope) -> bool {
        match self {
            ScopeView::One(s) => *s == scope,
            ScopeView::All => true,
        }
    }
}

/// What the caller asked for via `?scope=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeRequest {
    #[default]
    Own,
    Common,
    All,
}

impl ScopeRequest {
    /// Absent, `self` and `personal` all mean the caller's own pool.
    pub fn parse(raw: Option<&str>) -> CrmResult<Self> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(ScopeRequest::Own);
        };
        match raw.to_ascii_lowercase().as_str() {
            "self" | "personal" | "mine" => Ok(ScopeRequest::Own),
            "common" | "shared" => Ok(ScopeRequest::Common),
            "all" => Ok(ScopeRequest::All),
            other => Err(CrmError::Validation(format!("unknown scope '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityPolicy {
    super_admin_email: Option<String>,
}

impl VisibilityPolicy {
    pub fn new(super_admin_email: Option<String>) -> Self {
        Self {
            super_admin_email: super_admin_email
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        }
    }

    pub fn can_access_shared_pool(&self, actor: &Actor) -> bool {
        actor.role.is_privileged() || actor.shared_pool_access
    }

    pub fn is_super_admin(&self, actor: &Actor) -> bool {
        self.super_admin_email
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case(actor.email.trim()))
    }

    /// Resolve a read request to the scopes the actor may see.
    pub fn resolve_read(
        &self,
        actor: &Actor,
        request: ScopeRequest,
        target: Option<ActorId>,
    ) -> CrmResult<ScopeView> {
        match request {
            ScopeRequest::Own => Ok(ScopeView::One(actor.own_scope())),
            ScopeRequest::Common => {
                if !self.can_access_shared_pool(actor) {
                    return Err(CrmError::Forbidden(
                        "Access to Team Leads denied by Administrator.".into(),
                    ));
                }
                Ok(ScopeView::One(Scope::Shared))
            }
            ScopeRequest::All => {
                if !actor.role.is_privileged() {
                    return Err(CrmError::Forbidden("Access denied".into()));
                }
                Ok(match target {
                    Some(id) => ScopeView::One(Scope::Actor(id)),
                    None => ScopeView::All,
                })
            }
        }
    }

    /// Scope new leads land in: the shared pool when `common` was requested
    /// (same permission as reading it), the actor's own pool otherwise.
    pub fn resolve_target(&self, actor: &Actor, request: ScopeRequest) -> CrmResult<Scope> {
        match request {
            ScopeRequest::Common => match self.resolve_read(actor, request, None)? {
                ScopeView::One(scope) => Ok(scope),
                ScopeView::All => Ok(Scope::Shared),
            },
            ScopeRequest::Own | ScopeRequest::All => Ok(actor.own_scope()),
        }
    }

    /// Owner, shared pool, or super-admin: any one of them is enough.
    pub fn may_modify(&self, actor: &Actor, target: Scope) -> bool {
        target == actor.own_scope() || target == Scope::Shared || self.is_super_admin(actor)
    }

    pub fn authorize_modify(&self, actor: &Actor, target: Scope) -> CrmResult<()> {
        if self.may_modify(actor, target) {
            Ok(())
        } else {
            Err(CrmError::Forbidden("Unauthorized".into()))
        }
    }

    /// Runner or owner of the run's scope. Shared-pool runs follow the same
    /// access flag as the shared pool itself.
    fn owns_execution(&self, actor: &Actor, exec: &Execution) -> bool {
        if exec.created_by == Some(actor.id) {
            return true;
        }
        match exec.scope {
            Scope::Actor(id) => id == actor.id,
            Scope::Shared => self.can_access_shared_pool(actor),
        }
    }

    /// HR and the super-admin see every run; everyone else sees their own and,
    /// with access, the shared pool's.
    pub fn may_view_execution(&self, actor: &Actor, exec: &Execution) -> bool {
        actor.role.is_privileged() || self.is_super_admin(actor) || self.owns_execution(actor, exec)
    }

    /// Same as viewing, minus the HR-wide read.
    pub fn may_modify_execution(&self, actor: &Actor, exec: &Execution) -> bool {
        self.is_super_admin(actor) || self.owns_execution(actor, exec)
    }

    pub fn authorize_execution_view(&self, actor: &Actor, exec: &Execution) -> CrmResult<()> {
        if self.may_view_execution(actor, exec) {
            Ok(())
        } else {
            Err(CrmError::Forbidden("Access denied".into()))
        }
    }

    pub fn authorize_execution_modify(&self, actor: &Actor, exec: &Execution) -> CrmResult<()> {
        if self.may_modify_execution(actor, exec) {
            Ok(())
        } else {
            Err(CrmError::Forbidden("Unauthorized".into()))
        }
    }

    /// Gate for HR-only management routes.
    pub fn require_privileged(&self, actor: &Actor) -> CrmResult<()> {
        if actor.role.is_privileged() {
            Ok(())
        } else {
            Err(CrmError::Forbidden("Access denied".into()))
        }
    }
}
