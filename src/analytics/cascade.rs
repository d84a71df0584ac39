//! Cascade-impact analysis.
//!
//! If a service failed, which services lose a dependency? The direct set
//! is its immediate dependents (upstream neighbors); the indirect set is
//! everything that reaches the service only through them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::types::ServiceName;
use super::view::GraphView;

/// Impact sets for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeImpact {
    /// The service assumed to fail.
    pub service: ServiceName,
    /// Services with a direct edge onto the failed service.
    pub direct: Vec<ServiceName>,
    /// Services that depend on the failed service only transitively.
    pub indirect: Vec<ServiceName>,
}

impl CascadeImpact {
    /// Total number of affected services.
    pub fn affected_count(&self) -> usize {
        self.direct.len() + self.indirect.len()
    }
}

/// Compute the cascade impact of `service` failing.
///
/// Returns `None` when the service is not in the graph. The indirect set
/// is the reverse-edge closure from the direct dependents, minus the
/// direct set and the failed service itself.
pub fn cascade_impact(view: &GraphView, service: &ServiceName) -> Option<CascadeImpact> {
    let target = view.index_of(service)?;

    let direct_ids: Vec<usize> = view.incoming(target).to_vec();
    let direct_set: BTreeSet<usize> = direct_ids.iter().copied().collect();

    let mut indirect: Vec<usize> = Vec::new();
    let mut visited: BTreeSet<usize> = direct_set.clone();
    visited.insert(target);
    let mut queue: VecDeque<usize> = direct_ids.iter().copied().collect();

    while let Some(current) = queue.pop_front() {
        for &upstream in view.incoming(current) {
            if visited.insert(upstream) {
                indirect.push(upstream);
                queue.push_back(upstream);
            }
        }
    }

    Some(CascadeImpact {
        service: service.clone(),
        direct: direct_ids.into_iter().map(|v| view.name(v).clone()).collect(),
        indirect: indirect.into_iter().map(|v| view.name(v).clone()).collect(),
    })
}
