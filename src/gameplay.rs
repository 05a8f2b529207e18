use std::fmt;

use thiserror::Error;

use crate::model::{GameState, StateId};

/// A pour from one vial to another. Indices are only meaningful against the
/// vial order of the state the move was generated for.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Move {
    pub src: usize,
    pub dst: usize,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}

/// Recoverable rejections of a move, surfaced verbatim as user feedback.
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum MoveError {
    #[error("nothing to move")]
    EmptySource,
    #[error("wrong color on top of the destination vial")]
    ColorMismatch,
    #[error("no space in the destination vial")]
    NoCapacity,
}

/// A legal move together with the state it produces and that state's id.
#[derive(Clone, Debug)]
pub struct MovedState {
    pub mv: Move,
    pub state: GameState,
    pub id: StateId,
}

impl GameState {
    /// Enumerates every legal move: for each color, every ordered pair of
    /// vials topped by that color whose destination still has space, plus a
    /// move from every unsorted vial into the first empty vial. The order is
    /// deterministic (color, then source, then destination) but carries no
    /// meaning beyond that.
    pub fn get_valid_moves(&self) -> Vec<Move> {
        let mut empty_vial_idxs: Vec<usize> = Vec::new();
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); self.params.num_colors];
        for (i, vial) in self.vials.iter().enumerate() {
            match vial.get_top() {
                None => empty_vial_idxs.push(i),
                Some(group) => buckets[group.item].push(i),
            }
        }

        let mut valid_moves = Vec::new();
        for bucket in &buckets {
            for &src in bucket {
                for &dst in bucket {
                    if src == dst {
                        continue;
                    }
                    // A vial already at maximum height cannot receive anything
                    if self.vials[dst].get_height() == self.params.vial_height {
                        continue;
                    }
                    valid_moves.push(Move { src, dst });
                }
            }
        }

        if let Some(&empty) = empty_vial_idxs.first() {
            for bucket in &buckets {
                for &src in bucket {
                    if self.vials[src].is_sorted() {
                        continue;
                    }
                    valid_moves.push(Move { src, dst: empty });
                }
            }
        }

        valid_moves
    }

    /// Applies a move, producing a new state and leaving this one untouched.
    /// The amount moved is the smaller of the destination's free space and
    /// the source's top run. Out-of-range or self-targeting indices are
    /// caller bugs and panic; puzzle-state rejections come back as
    /// [`MoveError`]s.
    pub fn calc_move(&self, mv: Move) -> Result<GameState, MoveError> {
        assert!(
            mv.src != mv.dst,
            "move source and destination are the same vial ({})",
            mv.src
        );
        let vial_src = &self.vials[mv.src];
        let vial_dst = &self.vials[mv.dst];

        let Some(&top) = vial_src.get_top() else {
            return Err(MoveError::EmptySource);
        };
        if let Some(dst_top) = vial_dst.get_top()
            && dst_top.item != top.item
        {
            return Err(MoveError::ColorMismatch);
        }
        let amount = (self.params.vial_height - vial_dst.get_height()).min(top.count);
        if amount == 0 {
            return Err(MoveError::NoCapacity);
        }

        let mut new_src = vial_src.clone();
        new_src.drain_top(amount);
        let mut new_dst = vial_dst.clone();
        new_dst.stack_top(top.item, amount);

        let mut new_state = self.clone();
        new_state.vials[mv.src] = new_src;
        new_state.vials[mv.dst] = new_dst;
        Ok(new_state)
    }

    /// Applies every valid move, tagging each child state with its id.
    pub fn get_valid_moved_states(&self) -> Vec<MovedState> {
        self.get_valid_moves()
            .into_iter()
            .map(|mv| {
                let state = match self.calc_move(mv) {
                    Ok(state) => state,
                    Err(err) => panic!("generated move {mv} failed to apply: {err}"),
                };
                let id = state.get_state_id();
                MovedState { mv, state, id }
            })
            .collect()
    }
}
