use std::collections::HashMap;

use tracing::debug;

use crate::graph::{NodeId, ReachabilityGraph};
use crate::model::StateId;
use crate::scc::decompose_sccs;

/// Computes, for every crawled state, the probability of eventually reaching
/// the winning arrangement when every next move is drawn uniformly at random
/// from the state's valid moves.
///
/// Components are classified three ways and processed from the last emitted
/// to the first, so every component an edge leaves into is already solved:
/// the winning component gets probability 1, any other sink component loses
/// outright, and an internal component becomes an absorbing-Markov-chain
/// system `(I - Q) p = b` solved by elimination. `Q` holds the 1/degree edge
/// mass staying inside the component; `b` collects the mass escaping to
/// already-solved states, weighted by their probabilities. `(I - Q)` is
/// nonsingular because every state of a non-sink component keeps a positive
/// probability path out of it.
pub fn solve_success_probabilities(
    graph: &ReachabilityGraph,
    sccs: &[Vec<NodeId>],
    winning_id: &StateId,
) -> HashMap<StateId, f64> {
    let n = graph.len();
    let mut scc_of = vec![usize::MAX; n];
    for (i, component) in sccs.iter().enumerate() {
        for &node in component {
            scc_of[node] = i;
        }
    }

    // A sink keeps all of its outgoing edges internal
    let is_sink: Vec<bool> = sccs
        .iter()
        .enumerate()
        .map(|(i, component)| {
            component.iter().all(|&node| {
                graph
                    .node(node)
                    .children
                    .iter()
                    .all(|edge| scc_of[edge.target] == i)
            })
        })
        .collect();

    // An unwinnable puzzle never crawled the winning arrangement; every sink
    // then classifies as losing
    let winning_node = graph.lookup(winning_id);

    let mut probability: Vec<Option<f64>> = vec![None; n];
    for i in (0..sccs.len()).rev() {
        let component = &sccs[i];

        if let Some(win) = winning_node
            && scc_of[win] == i
        {
            // the winning state generates no moves, so its component is a
            // singleton
            probability[win] = Some(1.0);
            continue;
        }

        if is_sink[i] {
            for &node in component {
                probability[node] = Some(0.0);
            }
            continue;
        }

        let m = component.len();
        let local_index: HashMap<NodeId, usize> = component
            .iter()
            .enumerate()
            .map(|(k, &node)| (node, k))
            .collect();
        let mut coefficients = vec![vec![0.0; m]; m];
        for k in 0..m {
            coefficients[k][k] = 1.0;
        }
        let mut absorbing_mass = vec![0.0; m];

        for (row, &node) in component.iter().enumerate() {
            let children = &graph.node(node).children;
            let degree = children.len();
            if degree == 0 {
                continue;
            }
            let edge_mass = 1.0 / degree as f64;
            for edge in children {
                if scc_of[edge.target] == i {
                    coefficients[row][local_index[&edge.target]] -= edge_mass;
                } else {
                    let downstream = match probability[edge.target] {
                        Some(p) => p,
                        None => panic!("downstream component solved out of order"),
                    };
                    absorbing_mass[row] += edge_mass * downstream;
                }
            }
        }

        debug!(component = i, size = m, "solving internal component");
        let solved = solve_linear_system(coefficients, absorbing_mass);
        for (k, &node) in component.iter().enumerate() {
            probability[node] = Some(solved[k]);
        }
    }

    let mut result = HashMap::with_capacity(n);
    for (node_id, p) in probability.into_iter().enumerate() {
        if let Some(p) = p {
            result.insert(graph.node(node_id).id.clone(), p);
        }
    }
    result
}

/// Convenience wrapper: decomposes and solves against the graph's own
/// winning id in one call.
pub fn success_probabilities(graph: &ReachabilityGraph) -> HashMap<StateId, f64> {
    let sccs = decompose_sccs(graph, graph.start());
    solve_success_probabilities(graph, &sccs, graph.winning_id())
}

/// Dense Gaussian elimination with partial pivoting. The systems here are
/// diagonally dominated sub-stochastic matrices, so a vanishing pivot means
/// the graph invariants were violated upstream.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let m = b.len();
    for col in 0..m {
        let mut pivot = col;
        for row in col + 1..m {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if a[pivot][col].abs() < f64::EPSILON {
            panic!("singular transition system: a non-sink component must leak probability mass");
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let lead = a[col][col];
        for row in col + 1..m {
            let factor = a[row][col] / lead;
            if factor == 0.0 {
                continue;
            }
            for k in col..m {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; m];
    for row in (0..m).rev() {
        let mut sum = b[row];
        for k in row + 1..m {
            sum -= a[row][k] * x[k];
        }
        x[row] = sum / a[row][row];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GameState, StaticParams, Vial};

    #[test]
    fn linear_solver_inverts_a_small_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let b = vec![3.0, 5.0];
        let x = solve_linear_system(a, b);
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn merge_puzzle_always_wins() {
        let state = GameState::new(
            vec![
                Vial::from_items(&[0]),
                Vial::from_items(&[0]),
                Vial::new_empty(),
            ],
            StaticParams {
                vial_height: 2,
                num_colors: 1,
                empty_vials: 2,
            },
        );
        let graph = ReachabilityGraph::build(&state);
        let probabilities = success_probabilities(&graph);

        assert_eq!(probabilities[&state.get_state_id()], 1.0);
        assert_eq!(probabilities[graph.winning_id()], 1.0);
    }

    #[test]
    fn deadlock_always_loses() {
        let state = GameState::new(
            vec![Vial::from_items(&[0, 1]), Vial::from_items(&[1, 0])],
            StaticParams {
                vial_height: 2,
                num_colors: 2,
                empty_vials: 0,
            },
        );
        let graph = ReachabilityGraph::build(&state);
        let probabilities = success_probabilities(&graph);
        assert_eq!(probabilities[&state.get_state_id()], 0.0);
    }

    #[test]
    fn cyclic_unwinnable_component_loses() {
        // start and its one successor pour an item back and forth forever
        let state = GameState::new(
            vec![
                Vial::from_items(&[0, 0, 0]),
                Vial::from_items(&[0, 1]),
                Vial::from_items(&[1, 1]),
            ],
            StaticParams {
                vial_height: 3,
                num_colors: 2,
                empty_vials: 1,
            },
        );
        let graph = ReachabilityGraph::build(&state);
        let probabilities = success_probabilities(&graph);
        assert_eq!(probabilities.len(), 2);
        assert!(probabilities.values().all(|&p| p == 0.0));
    }

    #[test]
    fn probabilities_satisfy_the_fixed_point_law() {
        // A cyclic, winnable puzzle (the first pour can be undone): wherever
        // moves exist, the probability must equal the mean of the children's
        // probabilities, and it must be positive exactly where a win
        // distance exists.
        let state = GameState::from_repr("AABA;ABB;B;", None).unwrap();
        let graph = ReachabilityGraph::build(&state);
        let probabilities = success_probabilities(&graph);

        assert_eq!(probabilities.len(), graph.len());
        assert_eq!(probabilities[graph.winning_id()], 1.0);

        for node in graph.nodes() {
            let p = probabilities[&node.id];
            assert!((-1e-9..=1.0 + 1e-9).contains(&p), "p({}) = {p}", node.id);
            assert_eq!(p > 1e-12, node.distance_from_win.is_some());

            if node.children.is_empty() {
                continue;
            }
            let mean = node
                .children
                .iter()
                .map(|edge| probabilities[&graph.node(edge.target).id])
                .sum::<f64>()
                / node.children.len() as f64;
            assert!(
                (p - mean).abs() < 1e-9,
                "fixed point violated at {}: {p} vs {mean}",
                node.id
            );
        }
    }
}
