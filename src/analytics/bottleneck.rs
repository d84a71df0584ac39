//! Bottleneck detection.
//!
//! A service is a bottleneck when it carries disproportionate shortest-path
//! traffic and in-degree: `betweenness > 0.1` and
//! `in_degree > 1.5 · avg_in_degree`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ServiceName;
use super::criticality::betweenness;
use super::view::GraphView;

/// Risk banding for a bottleneck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// `betweenness > 0.2` and `in_degree > 2·avg`.
    High,
    /// Everything between the high and low thresholds.
    Medium,
    /// `betweenness < 0.15` and `in_degree < 1.8·avg`.
    Low,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// A detected bottleneck service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    /// Service name.
    pub service: ServiceName,
    /// Betweenness score.
    pub betweenness: f64,
    /// In-degree.
    pub in_degree: usize,
    /// Risk banding.
    pub risk: RiskLevel,
}

fn risk_for(betweenness: f64, in_degree: f64, avg_in_degree: f64) -> RiskLevel {
    if betweenness > 0.2 && in_degree > 2.0 * avg_in_degree {
        RiskLevel::High
    } else if betweenness < 0.15 && in_degree < 1.8 * avg_in_degree {
        RiskLevel::Low
    } else {
        RiskLevel::Medium
    }
}

/// Detect bottlenecks, most central first.
pub fn bottlenecks(view: &GraphView) -> Vec<Bottleneck> {
    let n = view.vertex_count();
    if n == 0 {
        return Vec::new();
    }

    let scores = betweenness(view);
    let total_in: usize = (0..n).map(|v| view.incoming(v).len()).sum();
    let avg_in_degree = total_in as f64 / n as f64;

    let mut found: Vec<Bottleneck> = (0..n)
        .filter_map(|v| {
            let in_degree = view.incoming(v).len();
            let is_bottleneck =
                scores[v] > 0.1 && in_degree as f64 > 1.5 * avg_in_degree;
            is_bottleneck.then(|| Bottleneck {
                service: view.name(v).clone(),
                betweenness: scores[v],
                in_degree,
                risk: risk_for(scores[v], in_degree as f64, avg_in_degree),
            })
        })
        .collect();

    found.sort_by(|a, b| {
        b.betweenness
            .partial_cmp(&a.betweenness)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.service.cmp(&b.service))
    });
    found
}
