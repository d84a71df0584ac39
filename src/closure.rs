//! Transitive inference over the resolved graph.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::types::{ResolvedGraph, ServiceName};

/// Compute the transitive closure of the resolved graph.
///
/// For each vertex, BFS over outgoing edges collects every reachable
/// vertex except the start. Reachable sets preserve first-discovery
/// order. Cycles are handled by the visited set; a vertex inside a cycle
/// still never appears in its own set.
pub fn transitive_closure(graph: &ResolvedGraph) -> BTreeMap<ServiceName, Vec<ServiceName>> {
    let mut closure = BTreeMap::new();

    for start in graph.vertices() {
        let mut reachable: Vec<ServiceName> = Vec::new();
        let mut visited: BTreeSet<ServiceName> = BTreeSet::new();
        let mut queue: VecDeque<ServiceName> = VecDeque::new();

        visited.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(current) = queue.pop_front() {
            for claim in graph.outgoing(&current) {
                let next = claim.to_service();
                if visited.insert(next.clone()) {
                    reachable.push(next.clone());
                    queue.push_back(next.clone());
                }
            }
        }

        closure.insert(start, reachable);
    }

    closure
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Claim, DependencyType};

    fn graph_of(edges: &[(&str, &str)]) -> ResolvedGraph {
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
        graph
    }

    fn names(list: &[ServiceName]) -> Vec<&str> {
        list.iter().map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_chain() {
        let graph = graph_of(&[("a", "b"), ("b", "c")]);
        let closure = transitive_closure(&graph);

        assert_eq!(names(&closure[&ServiceName::new("a")]), vec!["b", "c"]);
        assert_eq!(names(&closure[&ServiceName::new("b")]), vec!["c"]);
        assert!(closure[&ServiceName::new("c")].is_empty());
    }

    #[test]
    fn test_cycle_excludes_start() {
        let graph = graph_of(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let closure = transitive_closure(&graph);

        for (start, reachable) in &closure {
            assert!(!reachable.contains(start), "{start} reached itself");
            assert_eq!(reachable.len(), 2);
        }
    }

    #[test]
    fn test_discovery_order() {
        // a -> b, a -> d, b -> c: breadth-first discovery puts b and d
        // before c.
        let graph = graph_of(&[("a", "b"), ("a", "d"), ("b", "c")]);
        let closure = transitive_closure(&graph);
        assert_eq!(names(&closure[&ServiceName::new("a")]), vec!["b", "d", "c"]);
    }

    #[test]
    fn test_diamond_visited_once() {
        let graph = graph_of(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")]);
        let closure = transitive_closure(&graph);
        assert_eq!(names(&closure[&ServiceName::new("a")]), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_empty_graph() {
        let closure = transitive_closure(&ResolvedGraph::new());
        assert!(closure.is_empty());
    }
}
