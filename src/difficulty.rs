use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use tracing::debug;

use crate::model::{GameState, StateId};

/// One randomized playthrough attempt: the number of states it explored and
/// whether it found the win.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DifficultySample {
    pub difficulty: f64,
    pub success: bool,
}

/// Aggregate of repeated samples, bounded by the requested relative
/// tolerance on the standard error.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DifficultyEstimate {
    pub mean: f64,
    pub std_error: f64,
    pub trials: usize,
}

/// Draws one difficulty sample: a depth-first search that shuffles the valid
/// moves at every state and takes the first branch that reports a win,
/// counting 1 per explored state.
///
/// The seen-set is shared across the whole search tree and never rolled back
/// on backtracking, so a state reached through one branch stays "already
/// tried" for every sibling branch. That scoping is part of the meaning of
/// the reported numbers; widening it would change every estimate.
pub fn estimate_difficulty<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> DifficultySample {
    let mut seen_ids = HashSet::new();
    sample_search(state, &mut seen_ids, rng)
}

fn sample_search<R: Rng + ?Sized>(
    state: &GameState,
    seen_ids: &mut HashSet<StateId>,
    rng: &mut R,
) -> DifficultySample {
    if state.is_won() {
        return DifficultySample {
            difficulty: 0.0,
            success: true,
        };
    }
    if !seen_ids.insert(state.get_state_id()) {
        // a revisited state would already have reported success if it could,
        // but the lookup still cost a step
        return DifficultySample {
            difficulty: 1.0,
            success: false,
        };
    }

    let mut moves = state.get_valid_moves();
    moves.shuffle(rng);
    let mut difficulty = 1.0;
    for mv in moves {
        let next = match state.calc_move(mv) {
            Ok(next) => next,
            Err(err) => panic!("generated move {mv} failed to apply: {err}"),
        };
        let result = sample_search(&next, seen_ids, rng);
        difficulty += result.difficulty;
        if result.success {
            return DifficultySample {
                difficulty,
                success: true,
            };
        }
    }
    DifficultySample {
        difficulty,
        success: false,
    }
}

const SAMPLE_BATCH: usize = 32;

/// Repeats [`estimate_difficulty`] until the standard error of the running
/// mean drops within `rel_tolerance` of the mean. Samples are independent,
/// so each batch is drawn in parallel with per-thread RNGs. Returns `None`
/// once `cancel` is observed set.
pub fn estimate_difficulty_confidence(
    state: &GameState,
    rel_tolerance: f64,
    cancel: &AtomicBool,
) -> Option<DifficultyEstimate> {
    let mut sum = 0.0;
    let mut sq_sum = 0.0;
    let mut trials = 0usize;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return None;
        }
        let batch: Vec<f64> = (0..SAMPLE_BATCH)
            .into_par_iter()
            .map(|_| estimate_difficulty(state, &mut rand::rng()).difficulty)
            .collect();
        for difficulty in batch {
            sum += difficulty;
            sq_sum += difficulty * difficulty;
            trials += 1;
        }

        let mean = sum / trials as f64;
        let variance = (sq_sum / trials as f64 - mean * mean) / (trials - 1) as f64;
        let std_error = variance.max(0.0).sqrt();
        if rel_tolerance * mean >= std_error {
            debug!(trials, mean, std_error, "difficulty estimate converged");
            return Some(DifficultyEstimate {
                mean,
                std_error,
                trials,
            });
        }
    }
}
