//! Plays one game between two protocol sessions.
//!
//! Seat A moves on even plies and seat B on odd plies. After every accepted
//! move both engines are sent the complete move history from the start
//! position, never a delta, so neither engine can drift from the game that
//! is actually being played.

use tracing::{debug, info, info_span, warn, Instrument};

use crate::engine::session::{MoveReply, ProtocolSession};
use crate::game::legality::LegalityChecker;
use crate::game::moves::MoveHistory;
use crate::game::record::{GameOutcome, GameRecord, Seat};
use crate::{HarnessError, Result};

/// Plies during which a missing move means the game never really started.
const DEGENERATE_PLIES: usize = 2;

/// Per-game settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameConfig {
    /// Maximum half-moves before the game is stopped.
    pub ply_cap: u32,
    /// Validate each move against the position.
    pub validate_moves: bool,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            ply_cap: 120,
            validate_moves: true,
        }
    }
}

/// Drives single games.
#[derive(Debug, Clone)]
pub struct GameOrchestrator {
    config: GameConfig,
}

impl GameOrchestrator {
    /// Create an orchestrator with the given settings.
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        Self { config }
    }

    /// Play one game from the start position.
    ///
    /// Per-game faults (missing move, illegal move, crash) end the game and
    /// are reported through the returned record's outcome. An engine that
    /// exits while being sent a position counts as a crash of its seat.
    ///
    /// # Errors
    ///
    /// Returns fatal session errors (`HarnessError::Protocol`,
    /// `HarnessError::Io`), which must abort the match.
    pub async fn play(
        &self,
        a: &mut ProtocolSession,
        b: &mut ProtocolSession,
    ) -> Result<GameRecord> {
        let span = info_span!("game", ply_cap = self.config.ply_cap);
        self.play_inner(a, b).instrument(span).await
    }

    async fn play_inner(
        &self,
        a: &mut ProtocolSession,
        b: &mut ProtocolSession,
    ) -> Result<GameRecord> {
        let mut record = GameRecord::new();
        let mut checker = LegalityChecker::new(self.config.validate_moves);

        if let Some((seat, reason)) = sync_both(a, b, &record.moves).await? {
            warn!(ply = 0, engine = %seat, %reason, "engine crashed");
            return Ok(record.fault(seat, GameOutcome::Crashed, reason));
        }

        let ply_cap = usize::try_from(self.config.ply_cap).unwrap_or(usize::MAX);
        for ply in 0..ply_cap {
            let seat = Seat::for_ply(ply);
            let session = match seat {
                Seat::A => &mut *a,
                Seat::B => &mut *b,
            };

            let text = match session.request_move().await {
                Ok(MoveReply::Move(text)) => text,
                Ok(MoveReply::NoLegalMove) => {
                    return Ok(finish_without_move(
                        record,
                        ply,
                        seat,
                        "engine reported no legal move".into(),
                    ));
                }
                Err(HarnessError::MissingMove(reason)) => {
                    warn!(ply, engine = %seat, %reason, "no move returned");
                    return Ok(finish_without_move(record, ply, seat, reason));
                }
                Err(HarnessError::Crash(reason)) => {
                    warn!(ply, engine = %seat, %reason, "engine crashed");
                    return Ok(record.fault(seat, GameOutcome::Crashed, reason));
                }
                Err(err) => return Err(err),
            };

            match checker.accept(&text) {
                Ok(mv) => {
                    debug!(ply, engine = %seat, mv = %mv, "move accepted");
                    record.moves.push(mv);
                }
                Err(HarnessError::IllegalMove(reason)) => {
                    warn!(ply, engine = %seat, mv = %text, %reason, "illegal move");
                    record.illegal_moves += 1;
                    record.rejected_move = Some(text);
                    return Ok(record.fault(seat, GameOutcome::Illegal, reason));
                }
                Err(err) => return Err(err),
            }

            if let Some((crashed, reason)) = sync_both(a, b, &record.moves).await? {
                warn!(ply, engine = %crashed, %reason, "engine crashed");
                return Ok(record.fault(crashed, GameOutcome::Crashed, reason));
            }

            if checker.is_game_over() {
                info!(plies = record.moves.len(), fen = %checker.fen(), "game over on the board");
                return Ok(record.finish(GameOutcome::Completed, "game over on the board"));
            }
        }

        info!(plies = record.moves.len(), "ply cap reached");
        Ok(record.finish(GameOutcome::Completed, "ply cap reached"))
    }
}

/// Resend the full history to both engines. Returns the seat whose engine
/// turned out to have exited, if any.
async fn sync_both(
    a: &mut ProtocolSession,
    b: &mut ProtocolSession,
    moves: &MoveHistory,
) -> Result<Option<(Seat, String)>> {
    for (seat, session) in [(Seat::A, a), (Seat::B, b)] {
        match session.set_position(moves).await {
            Ok(()) => {}
            Err(HarnessError::Crash(reason)) => return Ok(Some((seat, reason))),
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}

/// A game without a move in its first plies is an error; later it is a
/// normal end (mate, stalemate, or an engine giving up).
fn finish_without_move(record: GameRecord, ply: usize, seat: Seat, reason: String) -> GameRecord {
    if ply < DEGENERATE_PLIES {
        record.fault(seat, GameOutcome::Error, reason)
    } else {
        info!(ply, engine = %seat, %reason, "game ended");
        record.finish(GameOutcome::Completed, reason)
    }
}
