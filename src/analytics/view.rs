//! Integer-id adjacency view of the resolved graph.
//!
//! Analytics run over contiguous vertex ids with side tables mapping
//! id ↔ name, keeping string hashing out of the hot loops. Adjacency
//! lists are sorted so traversal order is deterministic.

use std::collections::{BTreeMap, VecDeque};

use crate::types::{ResolvedGraph, ServiceName};

/// Adjacency-list view with integer vertex ids.
#[derive(Debug, Clone)]
pub struct GraphView {
    names: Vec<ServiceName>,
    index: BTreeMap<ServiceName, usize>,
    out: Vec<Vec<usize>>,
    inn: Vec<Vec<usize>>,
    /// Winning-claim confidence per (from, to) id pair.
    confidence: BTreeMap<(usize, usize), f64>,
}

impl GraphView {
    /// Build a view from a resolved graph.
    pub fn from_graph(graph: &ResolvedGraph) -> Self {
        let names: Vec<ServiceName> = graph.vertices().into_iter().collect();
        let index: BTreeMap<ServiceName, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let n = names.len();
        let mut out = vec![Vec::new(); n];
        let mut inn = vec![Vec::new(); n];
        let mut confidence = BTreeMap::new();

        for claim in graph.edges() {
            let from = index[claim.from_service()];
            let to = index[claim.to_service()];
            out[from].push(to);
            inn[to].push(from);
            confidence.insert((from, to), claim.confidence());
        }
        for list in out.iter_mut().chain(inn.iter_mut()) {
            list.sort_unstable();
        }

        Self { names, index, out, inn, confidence }
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.names.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.confidence.len()
    }

    /// Service name for a vertex id.
    pub fn name(&self, id: usize) -> &ServiceName {
        &self.names[id]
    }

    /// Vertex id for a service name.
    pub fn index_of(&self, name: &ServiceName) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Outgoing neighbor ids (sorted).
    pub fn outgoing(&self, id: usize) -> &[usize] {
        &self.out[id]
    }

    /// Incoming neighbor ids (sorted).
    pub fn incoming(&self, id: usize) -> &[usize] {
        &self.inn[id]
    }

    /// Winning-claim confidence for an edge.
    pub fn confidence(&self, from: usize, to: usize) -> Option<f64> {
        self.confidence.get(&(from, to)).copied()
    }

    /// BFS distances from `start` over outgoing edges (`None` = unreachable).
    pub fn bfs_distances(&self, start: usize) -> Vec<Option<u32>> {
        let mut dist = vec![None; self.vertex_count()];
        let mut queue = VecDeque::new();
        dist[start] = Some(0);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let next_dist = dist[current].unwrap_or(0) + 1;
            for &next in &self.out[current] {
                if dist[next].is_none() {
                    dist[next] = Some(next_dist);
                    queue.push_back(next);
                }
            }
        }
        dist
    }

    /// BFS parent pointers from `start`; parent[v] leads back toward
    /// `start` along one deterministic shortest path.
    pub fn bfs_parents(&self, start: usize) -> Vec<Option<usize>> {
        let mut parent = vec![None; self.vertex_count()];
        let mut seen = vec![false; self.vertex_count()];
        let mut queue = VecDeque::new();
        seen[start] = true;
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for &next in &self.out[current] {
                if !seen[next] {
                    seen[next] = true;
                    parent[next] = Some(current);
                    queue.push_back(next);
                }
            }
        }
        parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Claim, DependencyType};

    fn graph_of(edges: &[(&str, &str, f64)]) -> ResolvedGraph {
        let mut graph = ResolvedGraph::new();
        for (from, to, conf) in edges {
            graph.insert(
                Claim::new(
                    ServiceName::new(*from),
                    ServiceName::new(*to),
                    DependencyType::Runtime,
                    *conf,
                    "test",
                )
                .unwrap(),
            );
        }
        graph
    }

    #[test]
    fn test_view_shape() {
        let graph = graph_of(&[("a", "b", 0.8), ("b", "c", 0.9)]);
        let view = GraphView::from_graph(&graph);

        assert_eq!(view.vertex_count(), 3);
        assert_eq!(view.edge_count(), 2);

        let a = view.index_of(&ServiceName::new("a")).unwrap();
        let b = view.index_of(&ServiceName::new("b")).unwrap();
        let c = view.index_of(&ServiceName::new("c")).unwrap();

        assert_eq!(view.outgoing(a), &[b]);
        assert_eq!(view.incoming(c), &[b]);
        assert_eq!(view.confidence(b, c), Some(0.9));
        assert_eq!(view.confidence(c, b), None);
    }

    #[test]
    fn test_bfs_distances() {
        let graph = graph_of(&[("a", "b", 0.8), ("b", "c", 0.8)]);
        let view = GraphView::from_graph(&graph);
        let a = view.index_of(&ServiceName::new("a")).unwrap();
        let c = view.index_of(&ServiceName::new("c")).unwrap();

        let dist = view.bfs_distances(a);
        assert_eq!(dist[c], Some(2));
        // Nothing reaches back to a.
        assert_eq!(view.bfs_distances(c)[a], None);
    }
}
