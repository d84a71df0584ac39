//! Evidence storage backends.
//!
//! The store is append-only: claims are persisted once and never updated
//! or deleted. Replacement of prior evidence happens only by re-ingestion,
//! which appends. Backends keep two logical indexes, by directed edge and
//! by source.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{ClaimId, EdgeKey, NormalizedClaim, ServiceName};

/// Persisted record for a service seen in any claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Canonical service name.
    pub name: ServiceName,
    /// When the service was first observed.
    pub first_seen: DateTime<Utc>,
}

/// Trait for evidence storage backends.
///
/// Appends are serialized at the store boundary; reads observe a
/// consistent snapshot per call. All methods are async to support
/// database-backed implementations.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Append one normalized claim. Returns the persisted claim id.
    async fn save(&self, claim: &NormalizedClaim) -> Result<ClaimId, Self::Error>;

    /// All claims, in insertion order.
    async fn find_all(&self) -> Result<Vec<NormalizedClaim>, Self::Error>;

    /// Claims for a directed edge, in insertion order.
    async fn find_by_edge(
        &self,
        from: &ServiceName,
        to: &ServiceName,
    ) -> Result<Vec<NormalizedClaim>, Self::Error>;

    /// Claims from one source, in insertion order.
    async fn find_by_source(&self, source: &str) -> Result<Vec<NormalizedClaim>, Self::Error>;

    /// All known service records, sorted by name.
    async fn services(&self) -> Result<Vec<ServiceRecord>, Self::Error>;

    /// Total number of stored claims.
    async fn claim_count(&self) -> Result<usize, Self::Error>;

    /// Snapshot of the store grouped by edge, for resolution.
    async fn claims_by_edge(&self) -> Result<BTreeMap<EdgeKey, Vec<NormalizedClaim>>, Self::Error> {
        let mut grouped: BTreeMap<EdgeKey, Vec<NormalizedClaim>> = BTreeMap::new();
        for claim in self.find_all().await? {
            grouped.entry(EdgeKey::of(claim.claim())).or_default().push(claim);
        }
        Ok(grouped)
    }
}

/// In-process cache of service records, keyed by name.
///
/// Avoids duplicate service inserts within an ingestion batch. First
/// writer wins; lookups are serialized by a mutex around the LRU.
pub struct ServiceCache {
    cache: Mutex<LruCache<ServiceName, Arc<ServiceRecord>>>,
}

impl ServiceCache {
    /// Cache holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up a cached record.
    pub fn get(&self, name: &ServiceName) -> Option<Arc<ServiceRecord>> {
        self.cache.lock().get(name).cloned()
    }

    /// Insert a record unless one is already cached (first writer wins).
    /// Returns the record that ended up in the cache.
    pub fn insert_if_absent(&self, record: ServiceRecord) -> Arc<ServiceRecord> {
        let mut cache = self.cache.lock();
        if let Some(existing) = cache.get(&record.name) {
            return Arc::clone(existing);
        }
        let record = Arc::new(record);
        cache.put(record.name.clone(), Arc::clone(&record));
        record
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

impl Default for ServiceCache {
    fn default() -> Self {
        Self::new(4096)
    }
}

pub use memory::InMemoryEvidenceStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresEvidenceStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_cache_first_writer_wins() {
        let cache = ServiceCache::new(10);
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(10);

        let first = cache.insert_if_absent(ServiceRecord {
            name: ServiceName::new("a"),
            first_seen: t1,
        });
        let second = cache.insert_if_absent(ServiceRecord {
            name: ServiceName::new("a"),
            first_seen: t2,
        });

        assert_eq!(first.first_seen, t1);
        assert_eq!(second.first_seen, t1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_service_cache_eviction() {
        let cache = ServiceCache::new(2);
        for name in ["a", "b", "c"] {
            cache.insert_if_absent(ServiceRecord {
                name: ServiceName::new(name),
                first_seen: Utc::now(),
            });
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&ServiceName::new("a")).is_none());
        assert!(cache.get(&ServiceName::new("c")).is_some());
    }
}
