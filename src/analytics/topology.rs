//! Network-topology statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::view::GraphView;

/// Shape statistics of the resolved graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTopology {
    /// Number of services.
    pub vertex_count: usize,
    /// Number of resolved edges.
    pub edge_count: usize,
    /// `|E| / (|V|·(|V|-1))`.
    pub density: f64,
    /// Mean clustering coefficient over vertices with at least two
    /// neighbors.
    pub clustering_coefficient: f64,
    /// Longest finite BFS distance between any pair.
    pub diameter: u32,
}

/// Compute topology statistics. Division-by-zero cases come back as 0.
pub fn network_topology(view: &GraphView) -> NetworkTopology {
    let n = view.vertex_count();
    let e = view.edge_count();

    let density = if n < 2 {
        0.0
    } else {
        e as f64 / (n * (n - 1)) as f64
    };

    NetworkTopology {
        vertex_count: n,
        edge_count: e,
        density,
        clustering_coefficient: clustering_coefficient(view),
        diameter: diameter(view),
    }
}

/// Mean local clustering over vertices with ≥2 (undirected) neighbors:
/// directed links among neighbors over `k·(k-1)` possible.
fn clustering_coefficient(view: &GraphView) -> f64 {
    let n = view.vertex_count();
    let mut total = 0.0;
    let mut qualifying = 0usize;

    for v in 0..n {
        let neighbors: BTreeSet<usize> = view
            .outgoing(v)
            .iter()
            .chain(view.incoming(v))
            .copied()
            .filter(|&u| u != v)
            .collect();
        let k = neighbors.len();
        if k < 2 {
            continue;
        }

        let mut links = 0usize;
        for &a in &neighbors {
            for &b in &neighbors {
                if a != b && view.confidence(a, b).is_some() {
                    links += 1;
                }
            }
        }
        total += links as f64 / (k * (k - 1)) as f64;
        qualifying += 1;
    }

    if qualifying == 0 {
        0.0
    } else {
        total / qualifying as f64
    }
}

/// Longest finite shortest-path distance over all ordered pairs.
fn diameter(view: &GraphView) -> u32 {
    let n = view.vertex_count();
    let mut max_distance = 0u32;
    for start in 0..n {
        for distance in view.bfs_distances(start).into_iter().flatten() {
            max_distance = max_distance.max(distance);
        }
    }
    max_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Claim, DependencyType, ResolvedGraph, ServiceName};

    fn view_of(edges: &[(&str, &str)]) -> GraphView {
        let mut graph = ResolvedGraph::new();
        for (from, to) in edges {
            graph.insert(
                Claim::new(
                    ServiceName::new(*from),
                    ServiceName::new(*to),
                    DependencyType::Runtime,
                    0.8,
                    "test",
                )
                .unwrap(),
            );
        }
        GraphView::from_graph(&graph)
    }

    #[test]
    fn test_density() {
        let topo = network_topology(&view_of(&[("a", "b"), ("b", "c")]));
        // 2 edges over 3·2 ordered pairs.
        assert!((topo.density - 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_diameter_chain() {
        let topo = network_topology(&view_of(&[("a", "b"), ("b", "c"), ("c", "d")]));
        assert_eq!(topo.diameter, 3);
    }

    #[test]
    fn test_clustering_triangle() {
        // Fully linked triangle: every vertex's neighbors are linked both
        // ways or one way; a->b, b->c, c->a gives each vertex 2 neighbors
        // with 1 directed link between them (of 2 possible).
        let topo = network_topology(&view_of(&[("a", "b"), ("b", "c"), ("c", "a")]));
        assert!((topo.clustering_coefficient - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_clustering_in_star() {
        let topo = network_topology(&view_of(&[("a", "hub"), ("b", "hub"), ("c", "hub")]));
        // Only the hub has ≥2 neighbors, and they are unlinked.
        assert_eq!(topo.clustering_coefficient, 0.0);
    }

    #[test]
    fn test_empty_graph_zeroes() {
        let topo = network_topology(&view_of(&[]));
        assert_eq!(topo.vertex_count, 0);
        assert_eq!(topo.density, 0.0);
        assert_eq!(topo.clustering_coefficient, 0.0);
        assert_eq!(topo.diameter, 0);
    }
}
