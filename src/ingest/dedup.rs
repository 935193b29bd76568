// src/ingest/dedup.rs
//! Find-or-create resolution of normalized drafts against the store.

use anyhow::Result;

use crate::model::{Lead, LeadDraft, Scope};
use crate::store::LeadStore;

/// Match key inside one scope: phone when present, business name otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Phone(String),
    BusinessName(String),
}

impl DedupKey {
    /// A whitespace-only phone counts as absent.
    pub fn for_draft(draft: &LeadDraft) -> Self {
        match draft.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(phone) => DedupKey::Phone(phone.to_string()),
            None => DedupKey::BusinessName(draft.business_name.trim().to_string()),
        }
    }

    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            DedupKey::Phone(p) => lead.phone.as_deref().map(str::trim) == Some(p.as_str()),
            DedupKey::BusinessName(n) => lead.business_name.trim() == n,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub lead: Lead,
    pub created: bool,
}

/// Existing leads are returned as they are; re-ingestion never overwrites.
pub async fn resolve<S>(store: &S, scope: Scope, mut draft: LeadDraft) -> Result<Resolution>
where
    S: LeadStore + ?Sized,
{
    let key = DedupKey::for_draft(&draft);
    if matches!(key, DedupKey::BusinessName(_)) {
        draft.phone = None;
    }
    // Freshly ingested leads always start in the default status.
    draft.status = None;
    let (lead, created) = store.find_or_create(scope, &key, draft).await?;
    Ok(Resolution { lead, created })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn draft(name: &str, phone: Option<&str>) -> LeadDraft {
        LeadDraft {
            business_name: name.into(),
            phone: phone.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn key_prefers_phone() {
        assert_eq!(
            DedupKey::for_draft(&draft("A", Some("+1-555-0101"))),
            DedupKey::Phone("+1-555-0101".into())
        );
        assert_eq!(
            DedupKey::for_draft(&draft("A", Some("   "))),
            DedupKey::BusinessName("A".into())
        );
        assert_eq!(DedupKey::for_draft(&draft("A", None)), DedupKey::BusinessName("A".into()));
    }

    #[tokio::test]
    async fn phone_wins_over_business_name() {
        let store = MemoryStore::in_memory();
        let s = Scope::Actor(1);
        let first = resolve(&store, s, draft("A", Some("+1-555-0101"))).await.unwrap();
        let second = resolve(&store, s, draft("B", Some("+1-555-0101"))).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(second.lead.id, first.lead.id);
        assert_eq!(second.lead.business_name, "A");
    }

    #[tokio::test]
    async fn null_phone_dedups_by_name() {
        let store = MemoryStore::in_memory();
        let s = Scope::Shared;
        let a = resolve(&store, s, draft("A", None)).await.unwrap();
        let b = resolve(&store, s, draft("A", Some(" "))).await.unwrap();
        assert!(a.created);
        assert!(!b.created);
        assert_eq!(a.lead.id, b.lead.id);
    }

    #[tokio::test]
    async fn scopes_are_isolated() {
        let store = MemoryStore::in_memory();
        let x = resolve(&store, Scope::Actor(1), draft("A", Some("+1-555-0101")))
            .await
            .unwrap();
        let y = resolve(&store, Scope::Actor(2), draft("A", Some("+1-555-0101")))
            .await
            .unwrap();
        let shared = resolve(&store, Scope::Shared, draft("A", Some("+1-555-0101")))
            .await
            .unwrap();
        assert!(x.created && y.created && shared.created);
        assert_ne!(x.lead.id, y.lead.id);
        assert_ne!(y.lead.id, shared.lead.id);
    }

    #[tokio::test]
    async fn created_lead_gets_default_status_and_scope() {
        let store = MemoryStore::in_memory();
        let mut d = draft("Acme", None);
        d.status = Some("Closed - Won".into());
        let r = resolve(&store, Scope::Actor(9), d).await.unwrap();
        assert_eq!(r.lead.status, "Generated");
        assert_eq!(r.lead.scope, Scope::Actor(9));
    }
}
