//! In-memory evidence store.
//!
//! The default backend for tests and single-process deployments. Interior
//! mutability keeps the trait's `&self` contract; a `parking_lot` RwLock
//! serializes appends at the store boundary while readers clone out
//! consistent snapshots.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use crate::types::{ClaimId, EdgeKey, NormalizedClaim, ServiceName};
use super::{EvidenceStore, ServiceRecord};

/// Error type for the in-memory store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InMemoryError {
    /// A claim id was persisted twice (programmer error).
    #[error("Claim already persisted: {0}")]
    DuplicateClaim(ClaimId),
}

#[derive(Default)]
struct Inner {
    /// Claims in insertion order.
    claims: Vec<NormalizedClaim>,
    /// Edge index into `claims`.
    by_edge: BTreeMap<EdgeKey, Vec<usize>>,
    /// Source index into `claims`.
    by_source: BTreeMap<String, Vec<usize>>,
    /// Known services.
    services: BTreeMap<ServiceName, ServiceRecord>,
    /// Ids already seen, to reject double persistence.
    ids: BTreeMap<ClaimId, usize>,
}

/// Append-only in-memory evidence store.
#[derive(Default)]
pub struct InMemoryEvidenceStore {
    inner: RwLock<Inner>,
}

impl InMemoryEvidenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn register_service(inner: &mut Inner, name: &ServiceName) {
        inner.services.entry(name.clone()).or_insert_with(|| ServiceRecord {
            name: name.clone(),
            first_seen: Utc::now(),
        });
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    type Error = InMemoryError;

    async fn save(&self, claim: &NormalizedClaim) -> Result<ClaimId, Self::Error> {
        let mut inner = self.inner.write();
        let id = claim.claim().id();
        if inner.ids.contains_key(&id) {
            return Err(InMemoryError::DuplicateClaim(id));
        }

        let index = inner.claims.len();
        let key = EdgeKey::of(claim.claim());
        let source = claim.claim().source().to_string();

        Self::register_service(&mut inner, &key.from);
        Self::register_service(&mut inner, &key.to);

        inner.claims.push(claim.clone());
        inner.by_edge.entry(key).or_default().push(index);
        inner.by_source.entry(source).or_default().push(index);
        inner.ids.insert(id, index);

        Ok(id)
    }

    async fn find_all(&self) -> Result<Vec<NormalizedClaim>, Self::Error> {
        Ok(self.inner.read().claims.clone())
    }

    async fn find_by_edge(
        &self,
        from: &ServiceName,
        to: &ServiceName,
    ) -> Result<Vec<NormalizedClaim>, Self::Error> {
        let inner = self.inner.read();
        let key = EdgeKey::new(from.clone(), to.clone());
        Ok(inner
            .by_edge
            .get(&key)
            .map(|indexes| indexes.iter().map(|&i| inner.claims[i].clone()).collect())
            .unwrap_or_default())
    }

    async fn find_by_source(&self, source: &str) -> Result<Vec<NormalizedClaim>, Self::Error> {
        let inner = self.inner.read();
        Ok(inner
            .by_source
            .get(source)
            .map(|indexes| indexes.iter().map(|&i| inner.claims[i].clone()).collect())
            .unwrap_or_default())
    }

    async fn services(&self) -> Result<Vec<ServiceRecord>, Self::Error> {
        Ok(self.inner.read().services.values().cloned().collect())
    }

    async fn claim_count(&self) -> Result<usize, Self::Error> {
        Ok(self.inner.read().claims.len())
    }
}
