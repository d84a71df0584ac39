//! Conflict resolution.
//!
//! For each edge, the multiset of stored claims collapses to one winner by
//! the weighted score
//!
//! ```text
//! score(c, n) = confidence(c) · priority(source(c)) · reliability(source(c))
//!             + n
//!             + recency(c)
//! ```
//!
//! where `n` is the edge's claim multiplicity and
//! `recency(c) = 1 / (1 + age_in_seconds(c))`. Ties break by most recent
//! timestamp, then lexicographic source name. A manual override for an
//! edge bypasses scoring entirely.
//!
//! Resolution is a pure function of the store snapshot, the configuration,
//! the reliability snapshot, and the clock: it mutates neither the store
//! nor the input claims.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::reliability::DEFAULT_RELIABILITY;
use crate::types::{Claim, EdgeKey, NormalizedClaim, ResolvedGraph, ServiceName};

/// Resolver configuration: per-source priorities and manual overrides.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    priorities: BTreeMap<String, f64>,
    /// Edge spelled `from->to` (canonical names) to the source that must win.
    overrides: BTreeMap<String, String>,
}

impl ResolverConfig {
    /// Empty configuration: every source at priority 1.0, no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resolver priority for a source.
    pub fn with_priority(mut self, source: impl Into<String>, priority: f64) -> Self {
        self.priorities.insert(source.into(), priority.max(0.0));
        self
    }

    /// Force an edge's winner to the first claim from `source`.
    pub fn with_override(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let key = EdgeKey::new(
            ServiceName::new(from.into()),
            ServiceName::new(to.into()),
        );
        self.overrides.insert(key.override_key(), source.into());
        self
    }

    /// Parse and add an override key of the form `from->to`.
    /// Malformed keys are rejected with a warning.
    pub fn add_override_key(&mut self, key: &str, source: impl Into<String>) {
        match key.split_once("->") {
            Some((from, to)) if !from.trim().is_empty() && !to.trim().is_empty() => {
                let key = EdgeKey::new(ServiceName::new(from), ServiceName::new(to));
                self.overrides.insert(key.override_key(), source.into());
            }
            _ => tracing::warn!(key = %key, "ignoring malformed override key"),
        }
    }

    /// Add a priority entry (non-consuming form for config loaders).
    pub fn add_priority(&mut self, source: impl Into<String>, priority: f64) {
        self.priorities.insert(source.into(), priority.max(0.0));
    }

    /// Priority for a source (default 1.0).
    pub fn priority(&self, source: &str) -> f64 {
        self.priorities.get(source).copied().unwrap_or(1.0)
    }

    /// Override entry for an edge, if any.
    pub fn override_for(&self, edge: &EdgeKey) -> Option<&str> {
        self.overrides.get(&edge.override_key()).map(String::as_str)
    }
}

/// Collapses per-edge claim multisets to winning claims.
#[derive(Debug, Clone, Default)]
pub struct ConflictResolver {
    config: ResolverConfig,
}

impl ConflictResolver {
    /// Resolver with the given configuration.
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// The resolver's configuration.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Score one claim against an edge with multiplicity `n`.
    pub fn score(
        &self,
        claim: &Claim,
        multiplicity: usize,
        reliability: &BTreeMap<String, f64>,
        now: DateTime<Utc>,
    ) -> f64 {
        let source_reliability = reliability
            .get(claim.source())
            .copied()
            .unwrap_or(DEFAULT_RELIABILITY);
        let weighted =
            claim.confidence() * self.config.priority(claim.source()) * source_reliability;

        let age_seconds = (now - claim.timestamp()).num_seconds().max(0);
        let recency = 1.0 / (1.0 + age_seconds as f64);

        weighted + multiplicity as f64 + recency
    }

    /// Resolve a store snapshot into the winning-claim graph.
    ///
    /// An edge appears in the result iff the snapshot has at least one
    /// claim for it. An empty snapshot yields an empty graph.
    pub fn resolve(
        &self,
        claims_by_edge: &BTreeMap<EdgeKey, Vec<NormalizedClaim>>,
        reliability: &BTreeMap<String, f64>,
        now: DateTime<Utc>,
    ) -> ResolvedGraph {
        let mut graph = ResolvedGraph::new();

        for (edge, claims) in claims_by_edge {
            if claims.is_empty() {
                continue;
            }

            if let Some(wanted) = self.config.override_for(edge) {
                let wanted = wanted.trim();
                if let Some(winner) = claims
                    .iter()
                    .find(|c| c.claim().source().trim().eq_ignore_ascii_case(wanted))
                {
                    tracing::debug!(edge = %edge, source = %wanted, "override selected winner");
                    graph.insert(winner.claim().clone());
                    continue;
                }
                // No claim from the override's source: fall through to scoring.
                tracing::warn!(edge = %edge, source = %wanted, "override names absent source, scoring instead");
            }

            let multiplicity = claims.len();
            let mut best: Option<(&NormalizedClaim, f64)> = None;
            for candidate in claims {
                let score = self.score(candidate.claim(), multiplicity, reliability, now);
                let better = match &best {
                    None => true,
                    Some((current, best_score)) => {
                        match score.partial_cmp(best_score) {
                            Some(std::cmp::Ordering::Greater) => true,
                            Some(std::cmp::Ordering::Less) => false,
                            // Tie: most recent timestamp, then lexicographic source.
                            _ => match candidate
                                .claim()
                                .timestamp()
                                .cmp(&current.claim().timestamp())
                            {
                                std::cmp::Ordering::Greater => true,
                                std::cmp::Ordering::Less => false,
                                std::cmp::Ordering::Equal => {
                                    candidate.claim().source() < current.claim().source()
                                }
                            },
                        }
                    }
                };
                if better {
                    best = Some((candidate, score));
                }
            }

            if let Some((winner, _)) = best {
                graph.insert(winner.claim().clone());
            }
        }

        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DependencyType, Provenance};
    use chrono::Duration;

    fn make_claim(from: &str, to: &str, conf: f64, source: &str, age_secs: i64, now: DateTime<Utc>) -> NormalizedClaim {
        let claim = Claim::new(
            ServiceName::new(from),
            ServiceName::new(to),
            DependencyType::Runtime,
            conf,
            source,
        )
        .unwrap()
        .with_timestamp(now - Duration::seconds(age_secs));
        let prov = Provenance::from_claim(&claim);
        NormalizedClaim::new(claim, vec![prov]).unwrap()
    }

    fn by_edge(claims: Vec<NormalizedClaim>) -> BTreeMap<EdgeKey, Vec<NormalizedClaim>> {
        let mut grouped: BTreeMap<EdgeKey, Vec<NormalizedClaim>> = BTreeMap::new();
        for claim in claims {
            grouped.entry(EdgeKey::of(claim.claim())).or_default().push(claim);
        }
        grouped
    }

    #[test]
    fn test_override_bypasses_scoring() {
        let now = Utc::now();
        let claims = by_edge(vec![
            make_claim("servicea", "servicec", 0.9, "auto", 3600, now),
            make_claim("servicea", "servicec", 0.6, "manual", 0, now),
        ]);
        let config = ResolverConfig::new().with_override("ServiceA", "ServiceC", "manual");
        let resolver = ConflictResolver::new(config);

        let graph = resolver.resolve(&claims, &BTreeMap::new(), now);
        let winner = graph
            .winner(&ServiceName::new("servicea"), &ServiceName::new("servicec"))
            .unwrap();
        assert_eq!(winner.source(), "manual");
    }

    #[test]
    fn test_priority_dominates_without_override() {
        let now = Utc::now();
        let claims = by_edge(vec![
            make_claim("servicea", "servicec", 0.9, "auto", 3600, now),
            make_claim("servicea", "servicec", 0.6, "manual", 0, now),
        ]);
        let config = ResolverConfig::new().with_priority("manual", 5.0);
        let resolver = ConflictResolver::new(config);

        let graph = resolver.resolve(&claims, &BTreeMap::new(), now);
        let winner = graph
            .winner(&ServiceName::new("servicea"), &ServiceName::new("servicec"))
            .unwrap();
        // 0.6·5.0·0.8 = 2.4 beats 0.9·1.0·0.8 = 0.72.
        assert_eq!(winner.source(), "manual");
    }

    #[test]
    fn test_override_absent_source_falls_back() {
        let now = Utc::now();
        let claims = by_edge(vec![make_claim("a", "b", 0.9, "auto", 0, now)]);
        let config = ResolverConfig::new().with_override("a", "b", "manual");
        let resolver = ConflictResolver::new(config);

        let graph = resolver.resolve(&claims, &BTreeMap::new(), now);
        assert_eq!(
            graph.winner(&ServiceName::new("a"), &ServiceName::new("b")).unwrap().source(),
            "auto"
        );
    }

    #[test]
    fn test_per_edge_scoring() {
        let now = Utc::now();
        let claims = by_edge(vec![
            make_claim("a", "b", 0.7, "auto", 10, now),
            make_claim("a", "b", 0.7, "auto", 20, now),
            make_claim("a", "c", 0.9, "auto", 10, now),
        ]);
        let resolver = ConflictResolver::default();

        let graph = resolver.resolve(&claims, &BTreeMap::new(), now);
        // Both edges win independently.
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.winner(&ServiceName::new("a"), &ServiceName::new("b")).is_some());
        assert!(graph.winner(&ServiceName::new("a"), &ServiceName::new("c")).is_some());
    }

    #[test]
    fn test_recency_breaks_equal_confidence() {
        let now = Utc::now();
        let claims = by_edge(vec![
            make_claim("a", "b", 0.8, "old-source", 3600, now),
            make_claim("a", "b", 0.8, "new-source", 1, now),
        ]);
        let resolver = ConflictResolver::default();

        let graph = resolver.resolve(&claims, &BTreeMap::new(), now);
        assert_eq!(
            graph.winner(&ServiceName::new("a"), &ServiceName::new("b")).unwrap().source(),
            "new-source"
        );
    }

    #[test]
    fn test_reliability_feeds_score() {
        let now = Utc::now();
        let claims = by_edge(vec![
            make_claim("a", "b", 0.8, "trusted", 100, now),
            make_claim("a", "b", 0.8, "distrusted", 100, now),
        ]);
        let mut reliability = BTreeMap::new();
        reliability.insert("trusted".to_string(), 1.0);
        reliability.insert("distrusted".to_string(), 0.1);
        let resolver = ConflictResolver::default();

        let graph = resolver.resolve(&claims, &reliability, now);
        assert_eq!(
            graph.winner(&ServiceName::new("a"), &ServiceName::new("b")).unwrap().source(),
            "trusted"
        );
    }

    #[test]
    fn test_lexicographic_source_tie_break() {
        let now = Utc::now();
        let ts = now - Duration::seconds(50);
        let c1 = make_claim("a", "b", 0.8, "zeta", 50, now);
        let c2 = make_claim("a", "b", 0.8, "alpha", 50, now);
        // Identical timestamps and scores.
        assert_eq!(c1.claim().timestamp(), ts);
        assert_eq!(c2.claim().timestamp(), ts);

        let resolver = ConflictResolver::default();
        let graph = resolver.resolve(&by_edge(vec![c1, c2]), &BTreeMap::new(), now);
        assert_eq!(
            graph.winner(&ServiceName::new("a"), &ServiceName::new("b")).unwrap().source(),
            "alpha"
        );
    }

    #[test]
    fn test_empty_snapshot_empty_graph() {
        let resolver = ConflictResolver::default();
        let graph = resolver.resolve(&BTreeMap::new(), &BTreeMap::new(), Utc::now());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_deterministic_given_fixed_inputs() {
        let now = Utc::now();
        let claims = by_edge(vec![
            make_claim("a", "b", 0.7, "x", 10, now),
            make_claim("a", "b", 0.9, "y", 100, now),
            make_claim("b", "c", 0.5, "x", 10, now),
        ]);
        let resolver = ConflictResolver::default();

        let g1 = resolver.resolve(&claims, &BTreeMap::new(), now);
        let g2 = resolver.resolve(&claims, &BTreeMap::new(), now);
        assert_eq!(g1.fingerprint(), g2.fingerprint());
    }

    #[test]
    fn test_multiplicity_monotone() {
        // Doubling every claim on an edge must not change its winner
        // (scoring is monotone in n; every candidate gains the same bonus).
        let now = Utc::now();
        let single = by_edge(vec![
            make_claim("a", "b", 0.7, "x", 10, now),
            make_claim("a", "b", 0.9, "y", 10, now),
        ]);
        let resolver = ConflictResolver::default();
        let winner_once = resolver
            .resolve(&single, &BTreeMap::new(), now)
            .winner(&ServiceName::new("a"), &ServiceName::new("b"))
            .unwrap()
            .source()
            .to_string();

        let mut doubled_claims = Vec::new();
        for claims in single.values() {
            for c in claims {
                doubled_claims.push(c.clone());
                doubled_claims.push(c.clone());
            }
        }
        let winner_twice = resolver
            .resolve(&by_edge(doubled_claims), &BTreeMap::new(), now)
            .winner(&ServiceName::new("a"), &ServiceName::new("b"))
            .unwrap()
            .source()
            .to_string();

        assert_eq!(winner_once, winner_twice);
    }
}
