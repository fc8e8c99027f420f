//! Game records and outcome classification.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::game::moves::MoveHistory;

/// One of the two engine seats. Seat A moves first (white).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Seat {
    /// First mover.
    A,
    /// Second mover.
    B,
}

impl Seat {
    /// Seat on move at half-move index `ply`.
    #[must_use]
    pub fn for_ply(ply: usize) -> Self {
        if ply % 2 == 0 {
            Self::A
        } else {
            Self::B
        }
    }

    /// Position of this seat in a two-element array.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl Display for Seat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::B => f.write_str("B"),
        }
    }
}

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOutcome {
    /// Ran to the ply cap or ended normally after the opening plies.
    Completed,
    /// No move was produced in the first two plies.
    Error,
    /// An engine returned an illegal move.
    Illegal,
    /// An engine process exited mid-game.
    Crashed,
}

impl Display for GameOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Completed => "complete",
            Self::Error => "error",
            Self::Illegal => "illegal",
            Self::Crashed => "crashed",
        };
        f.write_str(name)
    }
}

/// Everything observed during one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameRecord {
    /// Accepted moves in play order.
    pub moves: MoveHistory,
    /// Final classification.
    pub outcome: GameOutcome,
    /// Illegal moves returned during this game.
    pub illegal_moves: u32,
    /// The move text that was rejected, if any.
    pub rejected_move: Option<String>,
    /// Seat responsible for an abnormal ending.
    pub faulted_seat: Option<Seat>,
    /// Why the game stopped.
    pub reason: String,
}

impl GameRecord {
    /// Start a record for a new game.
    #[must_use]
    pub fn new() -> Self {
        Self {
            moves: MoveHistory::new(),
            outcome: GameOutcome::Completed,
            illegal_moves: 0,
            rejected_move: None,
            faulted_seat: None,
            reason: String::new(),
        }
    }

    /// Seat that produced the move at `index`.
    #[must_use]
    pub fn producer_of(index: usize) -> Seat {
        Seat::for_ply(index)
    }

    /// Close the record with the given classification.
    #[must_use]
    pub fn finish(mut self, outcome: GameOutcome, reason: impl Into<String>) -> Self {
        self.outcome = outcome;
        self.reason = reason.into();
        self
    }

    /// Close the record with a fault attributed to `seat`.
    #[must_use]
    pub fn fault(self, seat: Seat, outcome: GameOutcome, reason: impl Into<String>) -> Self {
        let mut record = self.finish(outcome, reason);
        record.faulted_seat = Some(seat);
        record
    }
}

impl Default for GameRecord {
    fn default() -> Self {
        Self::new()
    }
}
