use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use vial_sort::{
    GameState, ReachabilityGraph, StateError, decompose_sccs, estimate_difficulty_confidence,
    solve_success_probabilities,
};

/// Crawl and analyze a sort-by-color vial puzzle.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// Vial layout, top item first, vials separated by ';' (e.g. "ABBA;BAAB;;")
    level: String,

    /// Vial capacity; defaults to the tallest vial in the layout
    #[arg(long)]
    vial_height: Option<usize>,

    /// Relative tolerance on the difficulty estimate's standard error
    #[arg(long, default_value_t = 0.02)]
    tolerance: f64,

    /// Skip the Monte Carlo difficulty estimate
    #[arg(long)]
    skip_difficulty: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), StateError> {
    let state = GameState::from_repr(&args.level, args.vial_height)?;
    for (color, &count) in state.get_color_counts().iter().enumerate() {
        if count != state.params.vial_height {
            warn!(
                color,
                count,
                quota = state.params.vial_height,
                "color count does not match the per-color quota; the puzzle cannot be solved"
            );
        }
    }

    let graph = ReachabilityGraph::build(&state);
    println!("states discovered:     {}", graph.len());

    let sccs = decompose_sccs(&graph, graph.start());
    println!("components:            {}", sccs.len());

    match graph.node(graph.start()).distance_from_win {
        Some(distance) => println!("winnable:              yes, in no fewer than {distance} moves"),
        None => println!("winnable:              no"),
    }

    let probabilities = solve_success_probabilities(&graph, &sccs, graph.winning_id());
    let p_start = probabilities
        .get(&state.get_state_id())
        .copied()
        .unwrap_or(0.0);
    println!("random-play success:   {p_start:.6}");

    if !args.skip_difficulty {
        let cancel = AtomicBool::new(false);
        if let Some(estimate) = estimate_difficulty_confidence(&state, args.tolerance, &cancel) {
            println!(
                "estimated difficulty:  {:.2} +/- {:.2} ({} trials)",
                estimate.mean, estimate.std_error, estimate.trials
            );
        }
    }
    Ok(())
}
