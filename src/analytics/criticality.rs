//! Criticality scoring.
//!
//! Composite centrality-and-confidence metric:
//!
//! ```text
//! criticality = 0.30·betweenness + 0.25·degree_centrality
//!             + 0.25·pagerank    + 0.20·avg_confidence
//! ```

use serde::{Deserialize, Serialize};

use crate::types::ServiceName;
use super::view::GraphView;

const PAGERANK_ITERATIONS: usize = 10;
const PAGERANK_DAMPING: f64 = 0.85;

/// Criticality breakdown for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalityScore {
    /// Service name.
    pub service: ServiceName,
    /// Composite score.
    pub score: f64,
    /// Betweenness component.
    pub betweenness: f64,
    /// Degree-centrality component.
    pub degree_centrality: f64,
    /// PageRank component.
    pub page_rank: f64,
    /// Mean winning-claim confidence on touching edges.
    pub avg_confidence: f64,
}

/// Betweenness approximated by shortest-path counting.
///
/// For every ordered pair (s, t), one BFS shortest path is traced and
/// each strictly intermediate vertex is credited. Counts normalize by
/// `(n-1)(n-2)`, the number of pairs a vertex could sit between.
pub fn betweenness(view: &GraphView) -> Vec<f64> {
    let n = view.vertex_count();
    let mut counts = vec![0.0f64; n];
    if n < 3 {
        return counts;
    }

    for source in 0..n {
        let parents = view.bfs_parents(source);
        for target in 0..n {
            if target == source || parents[target].is_none() {
                continue;
            }
            // Walk back from target; everything strictly between gets credit.
            let mut current = parents[target];
            while let Some(vertex) = current {
                if vertex == source {
                    break;
                }
                counts[vertex] += 1.0;
                current = parents[vertex];
            }
        }
    }

    let pairs = ((n - 1) * (n - 2)) as f64;
    counts.iter().map(|c| c / pairs).collect()
}

/// Degree centrality: `(in + out) / (2·(n-1))`.
pub fn degree_centrality(view: &GraphView) -> Vec<f64> {
    let n = view.vertex_count();
    if n < 2 {
        return vec![0.0; n];
    }
    let denom = (2 * (n - 1)) as f64;
    (0..n)
        .map(|v| (view.incoming(v).len() + view.outgoing(v).len()) as f64 / denom)
        .collect()
}

/// PageRank by a fixed 10-iteration power method, damping 0.85, uniform
/// init. Dangling mass is redistributed uniformly.
pub fn page_rank(view: &GraphView) -> Vec<f64> {
    let n = view.vertex_count();
    if n == 0 {
        return Vec::new();
    }
    let uniform = 1.0 / n as f64;
    let mut ranks = vec![uniform; n];

    for _ in 0..PAGERANK_ITERATIONS {
        let mut next = vec![(1.0 - PAGERANK_DAMPING) * uniform; n];
        let mut dangling = 0.0;

        for v in 0..n {
            let out = view.outgoing(v);
            if out.is_empty() {
                dangling += ranks[v];
                continue;
            }
            let share = ranks[v] / out.len() as f64;
            for &to in out {
                next[to] += PAGERANK_DAMPING * share;
            }
        }

        let dangling_share = PAGERANK_DAMPING * dangling * uniform;
        for rank in next.iter_mut() {
            *rank += dangling_share;
        }
        ranks = next;
    }
    ranks
}

/// Mean winning-claim confidence over the edges touching each vertex.
pub fn average_confidence(view: &GraphView) -> Vec<f64> {
    let n = view.vertex_count();
    (0..n)
        .map(|v| {
            let mut sum = 0.0;
            let mut count = 0usize;
            for &to in view.outgoing(v) {
                if let Some(conf) = view.confidence(v, to) {
                    sum += conf;
                    count += 1;
                }
            }
            for &from in view.incoming(v) {
                if let Some(conf) = view.confidence(from, v) {
                    sum += conf;
                    count += 1;
                }
            }
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        })
        .collect()
}

/// Criticality scores for every vertex, highest first (name breaks ties).
pub fn criticality_scores(view: &GraphView) -> Vec<CriticalityScore> {
    let betweenness = betweenness(view);
    let degree = degree_centrality(view);
    let ranks = page_rank(view);
    let confidence = average_confidence(view);

    let mut scores: Vec<CriticalityScore> = (0..view.vertex_count())
        .map(|v| CriticalityScore {
            service: view.name(v).clone(),
            score: 0.30 * betweenness[v]
                + 0.25 * degree[v]
                + 0.25 * ranks[v]
                + 0.20 * confidence[v],
            betweenness: betweenness[v],
            degree_centrality: degree[v],
            page_rank: ranks[v],
            avg_confidence: confidence[v],
        })
        .collect();

    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.service.cmp(&b.service))
    });
    scores
}
