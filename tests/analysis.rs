use std::sync::atomic::AtomicBool;

use rand::SeedableRng;
use rand::rngs::StdRng;

use vial_sort::{
    GameState, Move, ReachabilityGraph, StaticParams, Vial, decompose_sccs, estimate_difficulty,
    estimate_difficulty_confidence, get_winning_state_id, solve_success_probabilities,
};

fn analyze(state: &GameState) -> (ReachabilityGraph, Vec<Vec<usize>>) {
    let graph = ReachabilityGraph::build(state);
    let sccs = decompose_sccs(&graph, graph.start());
    (graph, sccs)
}

#[test]
fn merge_scenario_wins_in_one_move() {
    // One color split over two vials plus an empty third: the only legal
    // moves merge the split color, the result is the solved arrangement.
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

    let moves = state.get_valid_moves();
    assert_eq!(moves, vec![Move { src: 0, dst: 1 }, Move { src: 1, dst: 0 }]);
    let merged = state.calc_move(moves[0]).unwrap();
    assert!(merged.is_won());
    assert_eq!(merged.get_state_id(), get_winning_state_id(state.params));

    let (graph, sccs) = analyze(&state);
    let probabilities = solve_success_probabilities(&graph, &sccs, graph.winning_id());
    let win = graph.winning_node().expect("the win is reachable");
    assert_eq!(graph.node(win).distance_from_win, Some(0));
    assert_eq!(probabilities[&merged.get_state_id()], 1.0);
    assert_eq!(probabilities[&state.get_state_id()], 1.0);
}

#[test]
fn already_solved_scenario_has_no_moves() {
    // No empty vial, every vial one full color: immediately won, nothing to do.
    let state = GameState::new(
        vec![Vial::from_items(&[0, 0]), Vial::from_items(&[1, 1])],
        StaticParams {
            vial_height: 2,
            num_colors: 2,
            empty_vials: 0,
        },
    );
    assert!(state.get_valid_moves().is_empty());
    assert!(state.is_won());

    let (graph, sccs) = analyze(&state);
    assert_eq!(graph.len(), 1);
    let probabilities = solve_success_probabilities(&graph, &sccs, graph.winning_id());
    assert_eq!(probabilities[&state.get_state_id()], 1.0);
}

#[test]
fn deadlock_scenario_is_unwinnable() {
    // Interleaved colors, no empties: no move exists, and it is not the win.
    let state = GameState::new(
        vec![Vial::from_items(&[0, 1]), Vial::from_items(&[1, 0])],
        StaticParams {
            vial_height: 2,
            num_colors: 2,
            empty_vials: 0,
        },
    );
    assert!(state.get_valid_moves().is_empty());

    let (graph, sccs) = analyze(&state);
    assert_eq!(graph.node(graph.start()).distance_from_win, None);
    assert!(!graph.is_winnable());
    let probabilities = solve_success_probabilities(&graph, &sccs, graph.winning_id());
    assert_eq!(probabilities[&state.get_state_id()], 0.0);
}

#[test]
fn full_pipeline_on_a_cyclic_puzzle() {
    // Pouring an A from the full first vial into the second and pouring it
    // straight back are both legal, so the start sits on a cycle; the
    // puzzle is still winnable through the empty vial.
    let state = GameState::from_repr("AABA;ABB;B;", None).unwrap();
    let (graph, sccs) = analyze(&state);

    // the crawl found the win and the partition covers every state once
    assert!(graph.is_winnable());
    assert_eq!(sccs.iter().map(Vec::len).sum::<usize>(), graph.len());

    // this layout contains reversible pours, so some component is larger
    // than a single state
    assert!(sccs.iter().any(|component| component.len() > 1));

    let probabilities = solve_success_probabilities(&graph, &sccs, graph.winning_id());
    for node in graph.nodes() {
        let p = probabilities[&node.id];
        assert!((-1e-9..=1.0 + 1e-9).contains(&p));
        assert_eq!(p > 1e-12, node.distance_from_win.is_some());
    }

    // conservation holds across every discovered state
    let quota = state.get_color_counts();
    for node in graph.nodes() {
        assert_eq!(node.state.get_color_counts(), quota);
    }
}

#[test]
fn difficulty_estimates_track_winnability() {
    let winnable = GameState::from_repr("ABAB;BABA;;", None).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let sample = estimate_difficulty(&winnable, &mut rng);
    assert!(sample.difficulty >= 1.0);

    let cancel = AtomicBool::new(false);
    let estimate =
        estimate_difficulty_confidence(&winnable, 0.05, &cancel).expect("not canceled");
    assert!(estimate.mean >= 1.0);
    assert!(estimate.std_error <= 0.05 * estimate.mean);

    // a deadlocked puzzle fails every sample with a constant cost
    let deadlock = GameState::new(
        vec![Vial::from_items(&[0, 1]), Vial::from_items(&[1, 0])],
        StaticParams {
            vial_height: 2,
            num_colors: 2,
            empty_vials: 0,
        },
    );
    let sample = estimate_difficulty(&deadlock, &mut rng);
    assert!(!sample.success);
    assert_eq!(sample.difficulty, 1.0);
}

#[test]
fn graph_rebuild_is_deterministic() {
    let state = GameState::from_repr("AAB;ABB;;", None).unwrap();
    let first = ReachabilityGraph::build(&state);
    let second = ReachabilityGraph::build(&state);
    assert_eq!(first.len(), second.len());
    for (a, b) in first.nodes().iter().zip(second.nodes()) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.distance_from_start, b.distance_from_start);
        assert_eq!(a.distance_from_win, b.distance_from_win);
        assert_eq!(a.children.len(), b.children.len());
    }
}
