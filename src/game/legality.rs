//! Move legality checking backed by `cozy-chess`.
//!
//! The checker mirrors the game on its own board and only accepts a move the
//! side to move can actually play. UCI engines report castling king-to-target
//! (`e1g1`) while `cozy-chess` encodes it king-takes-rook (`e1h1`). Only the
//! king-to-target form is accepted.

use cozy_chess::{Board, File, GameStatus, Move, Piece, Square};

use crate::game::moves::CoordinateMove;
use crate::{HarnessError, Result};

/// Tracks the current position and validates incoming moves.
#[derive(Debug, Clone)]
pub struct LegalityChecker {
    board: Board,
    enabled: bool,
}

impl LegalityChecker {
    /// A checker at the standard start position. With `enabled == false` only
    /// notation is checked and positions are not tracked.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            board: Board::default(),
            enabled,
        }
    }

    /// Whether position legality is being enforced.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Validate `text` and, when legal, play it on the tracked board.
    ///
    /// # Errors
    ///
    /// `HarnessError::IllegalMove` when the text is not coordinate notation or
    /// (with checking enabled) the move is not legal in the current position.
    pub fn accept(&mut self, text: &str) -> Result<CoordinateMove> {
        let mv: CoordinateMove = text.parse()?;
        if !self.enabled {
            return Ok(mv);
        }

        let found = self.find_legal(mv.as_str()).ok_or_else(|| {
            HarnessError::IllegalMove(format!("{mv} is not legal in {}", self.board))
        })?;
        self.board.play(found);
        Ok(mv)
    }

    /// Every legal move in the current position, in UCI notation.
    #[must_use]
    pub fn legal_moves(&self) -> Vec<String> {
        let mut moves = Vec::new();
        self.board.generate_moves(|piece_moves| {
            for mv in piece_moves {
                moves.push(uci_notation(&self.board, mv));
            }
            false
        });
        moves
    }

    /// Whether the tracked position is checkmate or a draw by rule.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.enabled && self.board.status() != GameStatus::Ongoing
    }

    /// FEN of the tracked position.
    #[must_use]
    pub fn fen(&self) -> String {
        self.board.to_string()
    }

    fn find_legal(&self, text: &str) -> Option<Move> {
        let mut found = None;
        self.board.generate_moves(|piece_moves| {
            for mv in piece_moves {
                if uci_notation(&self.board, mv) == text {
                    found = Some(mv);
                    return true;
                }
            }
            false
        });
        found
    }
}

/// Render `mv` the way UCI engines report it: castling as king-to-target.
fn uci_notation(board: &Board, mv: Move) -> String {
    let castles = board.piece_on(mv.from) == Some(Piece::King)
        && board.color_on(mv.to) == Some(board.side_to_move());
    if !castles {
        return mv.to_string();
    }
    let file = if (mv.to.file() as usize) > (mv.from.file() as usize) {
        File::G
    } else {
        File::C
    };
    let target = Square::new(file, mv.from.rank());
    format!("{}{}", mv.from, target)
}
