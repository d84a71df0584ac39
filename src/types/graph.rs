//! Resolved-graph types.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use xxhash_rust::xxh64::xxh64;

use super::claim::Claim;
use super::service::ServiceName;

/// Directed edge key `(from, to)`.
///
/// Implements `Ord` for deterministic ordering: from, then to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    /// Depending service.
    pub from: ServiceName,
    /// Depended-upon service.
    pub to: ServiceName,
}

impl EdgeKey {
    /// Create an edge key.
    pub fn new(from: ServiceName, to: ServiceName) -> Self {
        Self { from, to }
    }

    /// Key for a claim's edge.
    pub fn of(claim: &Claim) -> Self {
        Self {
            from: claim.from_service().clone(),
            to: claim.to_service().clone(),
        }
    }

    /// Override-map spelling of this edge (`from->to`).
    pub fn override_key(&self) -> String {
        format!("{}->{}", self.from, self.to)
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Conflict-resolved dependency graph.
///
/// Adjacency mapping `from -> (to -> winning claim)` with exactly one
/// winning claim per realized edge. `BTreeMap` keeps iteration
/// deterministic for closure, analytics, and fingerprinting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedGraph {
    adjacency: BTreeMap<ServiceName, BTreeMap<ServiceName, Claim>>,
}

impl ResolvedGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the winning claim for an edge. Later inserts replace earlier ones.
    pub fn insert(&mut self, winner: Claim) {
        self.adjacency
            .entry(winner.from_service().clone())
            .or_default()
            .insert(winner.to_service().clone(), winner);
    }

    /// Winning claim for an edge, if realized.
    pub fn winner(&self, from: &ServiceName, to: &ServiceName) -> Option<&Claim> {
        self.adjacency.get(from).and_then(|m| m.get(to))
    }

    /// Outgoing winners of a vertex, in target order.
    pub fn outgoing(&self, from: &ServiceName) -> impl Iterator<Item = &Claim> {
        self.adjacency.get(from).into_iter().flat_map(|m| m.values())
    }

    /// Iterate all winning claims in (from, to) order.
    pub fn edges(&self) -> impl Iterator<Item = &Claim> {
        self.adjacency.values().flat_map(|m| m.values())
    }

    /// Number of realized edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(|m| m.len()).sum()
    }

    /// All vertices (union of edge endpoints), sorted.
    pub fn vertices(&self) -> BTreeSet<ServiceName> {
        let mut vertices = BTreeSet::new();
        for (from, targets) in &self.adjacency {
            vertices.insert(from.clone());
            for to in targets.keys() {
                vertices.insert(to.clone());
            }
        }
        vertices
    }

    /// Number of distinct vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices().len()
    }

    /// Whether the graph has no edges.
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Deterministic fingerprint of the graph shape and winners.
    ///
    /// Hashes the sorted `(from, to, source, confidence-in-micros)` tuples,
    /// so the same store state, configuration, and reliability snapshot
    /// always produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let tuples: Vec<(String, String, String, i64)> = self
            .edges()
            .map(|c| {
                (
                    c.from_service().to_string(),
                    c.to_service().to_string(),
                    c.source().to_string(),
                    (c.confidence() * 1_000_000.0).round() as i64,
                )
            })
            .collect();
        let bytes = serde_json::to_vec(&tuples).unwrap_or_default();
        format!("{:016x}", xxh64(&bytes, 0))
    }
}
