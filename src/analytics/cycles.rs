//! Cycle detection.
//!
//! Cycles are preserved in the resolved graph; this analytic reports
//! them without removing anything. Detection finds the strongly
//! connected components with more than one vertex (plus single vertices
//! with a self-referential path through the component).

use serde::{Deserialize, Serialize};

use crate::types::ServiceName;
use super::view::GraphView;

/// A dependency cycle: the member services of one strongly connected
/// component, sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyCycle {
    /// Services participating in the cycle.
    pub members: Vec<ServiceName>,
}

impl DependencyCycle {
    /// Number of services in the cycle.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the cycle is empty (never produced by detection).
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Iterative Tarjan state per vertex.
struct TarjanState {
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

/// Detect dependency cycles, largest first (ties by first member name).
///
/// Only components with two or more vertices are cycles in this graph
/// model: self-loops are rejected at claim construction, so a lone
/// vertex can never reach itself.
pub fn dependency_cycles(view: &GraphView) -> Vec<DependencyCycle> {
    let n = view.vertex_count();
    let mut state = TarjanState {
        index: vec![None; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        next_index: 0,
        components: Vec::new(),
    };

    for v in 0..n {
        if state.index[v].is_none() {
            strong_connect(view, v, &mut state);
        }
    }

    let mut cycles: Vec<DependencyCycle> = state
        .components
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|component| {
            let mut members: Vec<ServiceName> =
                component.into_iter().map(|v| view.name(v).clone()).collect();
            members.sort();
            DependencyCycle { members }
        })
        .collect();

    cycles.sort_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then_with(|| a.members.first().cmp(&b.members.first()))
    });
    cycles
}

/// Iterative Tarjan strong-connect (explicit stack, no recursion).
fn strong_connect(view: &GraphView, root: usize, state: &mut TarjanState) {
    // Frame: (vertex, next outgoing-neighbor position).
    let mut call_stack: Vec<(usize, usize)> = vec![(root, 0)];

    while let Some(&(v, pos)) = call_stack.last() {
        if pos == 0 {
            state.index[v] = Some(state.next_index);
            state.lowlink[v] = state.next_index;
            state.next_index += 1;
            state.stack.push(v);
            state.on_stack[v] = true;
        }

        let neighbors = view.outgoing(v);
        if pos < neighbors.len() {
            if let Some(frame) = call_stack.last_mut() {
                frame.1 += 1;
            }
            let next = neighbors[pos];
            match state.index[next] {
                None => call_stack.push((next, 0)),
                Some(next_index) => {
                    if state.on_stack[next] {
                        state.lowlink[v] = state.lowlink[v].min(next_index);
                    }
                }
            }
            continue;
        }

        // All neighbors explored: close the frame.
        call_stack.pop();
        if let Some(&(parent, _)) = call_stack.last() {
            state.lowlink[parent] = state.lowlink[parent].min(state.lowlink[v]);
        }

        if state.index[v] == Some(state.lowlink[v]) {
            let mut component = Vec::new();
            while let Some(w) = state.stack.pop() {
                state.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            state.components.push(component);
        }
    }
}
