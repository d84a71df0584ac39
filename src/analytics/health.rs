//! Per-edge dependency health.
//!
//! ```text
//! health = 0.4·mean_confidence + 0.3·consistency + 0.3·source_reliability
//! consistency = max(0, 1 − stddev(confidences))
//! ```
//!
//! Status bands at 0.7 (healthy) and 0.5 (warning).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::reliability::DEFAULT_RELIABILITY;
use crate::types::{EdgeKey, NormalizedClaim};

/// Health banding for an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// Score ≥ 0.7.
    Healthy,
    /// Score ≥ 0.5.
    Warning,
    /// Everything below.
    Critical,
}

impl HealthStatus {
    fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::Healthy
        } else if score >= 0.5 {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Health report for one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyHealth {
    /// The edge under assessment.
    pub edge: EdgeKey,
    /// Composite health score.
    pub score: f64,
    /// Mean claim confidence.
    pub mean_confidence: f64,
    /// Agreement between claims: `max(0, 1 − stddev)`.
    pub consistency: f64,
    /// Mean reliability over the edge's distinct sources.
    pub source_reliability: f64,
    /// Number of claims backing the edge.
    pub claim_count: usize,
    /// Health banding.
    pub status: HealthStatus,
}

/// Population standard deviation.
fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Assess the health of every edge in a store snapshot, worst first.
pub fn dependency_health(
    claims_by_edge: &BTreeMap<EdgeKey, Vec<NormalizedClaim>>,
    reliability: &BTreeMap<String, f64>,
) -> Vec<DependencyHealth> {
    let mut reports: Vec<DependencyHealth> = claims_by_edge
        .iter()
        .filter(|(_, claims)| !claims.is_empty())
        .map(|(edge, claims)| {
            let confidences: Vec<f64> = claims.iter().map(|c| c.claim().confidence()).collect();
            let mean_confidence = confidences.iter().sum::<f64>() / confidences.len() as f64;
            let consistency = (1.0 - stddev(&confidences, mean_confidence)).max(0.0);

            let mut sources: Vec<&str> = claims.iter().map(|c| c.claim().source()).collect();
            sources.sort_unstable();
            sources.dedup();
            let source_reliability = sources
                .iter()
                .map(|s| reliability.get(*s).copied().unwrap_or(DEFAULT_RELIABILITY))
                .sum::<f64>()
                / sources.len() as f64;

            let score =
                0.4 * mean_confidence + 0.3 * consistency + 0.3 * source_reliability;

            DependencyHealth {
                edge: edge.clone(),
                score,
                mean_confidence,
                consistency,
                source_reliability,
                claim_count: claims.len(),
                status: HealthStatus::from_score(score),
            }
        })
        .collect();

    reports.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.edge.cmp(&b.edge))
    });
    reports
}
