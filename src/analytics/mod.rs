//! Graph analytics over the resolved dependency graph.
//!
//! All analytics are pure computations over an immutable snapshot: build
//! a [`GraphView`] from a [`crate::types::ResolvedGraph`] and query it.
//! Division-by-zero cases come back as 0 rather than raising.

pub mod view;
pub mod criticality;
pub mod topology;
pub mod bottleneck;
pub mod cascade;
pub mod cycles;
pub mod health;

use serde::{Deserialize, Serialize};

use crate::types::ServiceName;

pub use view::GraphView;
pub use criticality::{criticality_scores, CriticalityScore};
pub use topology::{network_topology, NetworkTopology};
pub use bottleneck::{bottlenecks, Bottleneck, RiskLevel};
pub use cascade::{cascade_impact, CascadeImpact};
pub use cycles::{dependency_cycles, DependencyCycle};
pub use health::{dependency_health, DependencyHealth, HealthStatus};

/// Which analysis to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisKind {
    /// Composite criticality scores per service.
    Criticality,
    /// Density, clustering, diameter.
    Topology,
    /// Bottleneck services with risk banding.
    Bottlenecks,
    /// Per-edge dependency health.
    Health,
    /// Dependency cycles (reported, never removed).
    Cycles,
    /// Cascade impact of one service failing.
    Impact(ServiceName),
}

impl AnalysisKind {
    /// Parse a kind from a CLI-style string (`impact:<service>` for impact).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "criticality" => Some(Self::Criticality),
            "topology" => Some(Self::Topology),
            "bottlenecks" => Some(Self::Bottlenecks),
            "health" => Some(Self::Health),
            "cycles" => Some(Self::Cycles),
            _ => s
                .strip_prefix("impact:")
                .or_else(|| s.strip_prefix("impact="))
                .map(|svc| Self::Impact(ServiceName::new(svc))),
        }
    }
}

/// Result of [`AnalysisKind`]-dispatched analytics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Analytics {
    /// Criticality scores, highest first.
    Criticality(Vec<CriticalityScore>),
    /// Topology statistics.
    Topology(NetworkTopology),
    /// Detected bottlenecks.
    Bottlenecks(Vec<Bottleneck>),
    /// Edge health reports, worst first.
    Health(Vec<DependencyHealth>),
    /// Dependency cycles, largest first.
    Cycles(Vec<DependencyCycle>),
    /// Impact sets for the queried service (`None` if unknown).
    Impact(Option<CascadeImpact>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!(AnalysisKind::parse("criticality"), Some(AnalysisKind::Criticality));
        assert_eq!(AnalysisKind::parse("Topology"), Some(AnalysisKind::Topology));
        assert_eq!(
            AnalysisKind::parse("impact:auth-service"),
            Some(AnalysisKind::Impact(ServiceName::new("auth-service")))
        );
        assert_eq!(AnalysisKind::parse("nonsense"), None);
    }
}
