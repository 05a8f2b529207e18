use tracing::debug;

use crate::graph::{NodeId, ReachabilityGraph};

/// Decomposes the graph into strongly connected components, iteratively in
/// two passes: a depth-first walk over child edges from `start` records a
/// finish order, then parent edges are walked in decreasing finish order,
/// each sweep claiming one component. The game graph contains cycles (a pour
/// and its inverse can both be legal), so this decomposition is what makes
/// the probability solve sound.
///
/// Components come out topologically ordered over child edges: an edge out
/// of a component only ever points at a later-emitted component, so
/// consumers can process the list back to front and find every downstream
/// component already handled.
pub fn decompose_sccs(graph: &ReachabilityGraph, start: NodeId) -> Vec<Vec<NodeId>> {
    let n = graph.len();
    let mut visited = vec![false; n];
    let mut finish_order: Vec<NodeId> = Vec::with_capacity(n);
    // (node, next child edge to look at); an explicit stack keeps large
    // state spaces from overflowing the call stack
    let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
    visited[start] = true;

    loop {
        let step = {
            let Some(frame) = stack.last_mut() else { break };
            let children = &graph.node(frame.0).children;
            if frame.1 < children.len() {
                let child = children[frame.1].target;
                frame.1 += 1;
                Some(child)
            } else {
                None
            }
        };
        match step {
            Some(child) => {
                if !visited[child] {
                    visited[child] = true;
                    stack.push((child, 0));
                }
            }
            None => {
                // every child handled: this node finishes now
                if let Some((node, _)) = stack.pop() {
                    finish_order.push(node);
                }
            }
        }
    }

    let mut claimed = vec![false; n];
    let mut components: Vec<Vec<NodeId>> = Vec::new();
    for &root in finish_order.iter().rev() {
        if claimed[root] {
            continue;
        }
        claimed[root] = true;
        let mut component = Vec::new();
        let mut walk = vec![root];
        while let Some(node) = walk.pop() {
            component.push(node);
            for edge in &graph.node(node).parents {
                if !claimed[edge.target] {
                    claimed[edge.target] = true;
                    walk.push(edge.target);
                }
            }
        }
        components.push(component);
    }

    debug!(components = components.len(), "scc decomposition finished");
    components
}
