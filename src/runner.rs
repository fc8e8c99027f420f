//! Match runner: plays a series of games between two engine sessions.
//!
//! The runner owns both sessions for the whole match. Engines are spawned
//! once, handshaken once, and reset with `ucinewgame` between games; the
//! process identity persists unless an engine crashes and restarts are
//! enabled. Whatever happens inside the game loop, both sessions are
//! terminated exactly once before [`MatchRunner::run`] returns, and the
//! report covers everything observed up to the stopping point.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::engine::session::{ProtocolSession, SessionConfig};
use crate::engine::supervisor::{self, EngineCommand, EngineProcess};
use crate::game::orchestrator::{GameConfig, GameOrchestrator};
use crate::game::record::{GameOutcome, GameRecord, Seat};
use crate::{HarnessError, Result};

/// Diagnostic lines logged per engine when a match aborts.
const ABORT_DIAGNOSTIC_LINES: usize = 8;

/// Source of engine processes for the two seats.
pub trait EngineFactory {
    /// Launch the engine for `seat`.
    ///
    /// # Errors
    ///
    /// `HarnessError::Spawn` when the engine cannot be started.
    fn launch(&mut self, seat: Seat) -> Result<EngineProcess>;
}

impl<F> EngineFactory for F
where
    F: FnMut(Seat) -> Result<EngineProcess>,
{
    fn launch(&mut self, seat: Seat) -> Result<EngineProcess> {
        self(seat)
    }
}

/// Launches engine executables as OS processes.
#[derive(Debug, Clone)]
pub struct ExecutableFactory {
    commands: [EngineCommand; 2],
    max_line_bytes: usize,
}

impl ExecutableFactory {
    /// Factory launching `a` for seat A and `b` for seat B.
    #[must_use]
    pub fn new(a: EngineCommand, b: EngineCommand, max_line_bytes: usize) -> Self {
        Self {
            commands: [a, b],
            max_line_bytes,
        }
    }

    /// Factory built from the harness configuration.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(
            config.engine_command(Seat::A),
            config.engine_command(Seat::B),
            config.max_line_bytes,
        )
    }
}

impl EngineFactory for ExecutableFactory {
    fn launch(&mut self, seat: Seat) -> Result<EngineProcess> {
        supervisor::spawn(&self.commands[seat.index()], self.max_line_bytes)
    }
}

/// Match-level settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchConfig {
    /// Number of games to play.
    pub games: u32,
    /// Respawn a crashed engine before the next game.
    pub restart_crashed: bool,
    /// Protocol settings for both sessions.
    pub session: SessionConfig,
    /// Per-game settings.
    pub game: GameConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            games: 20,
            restart_crashed: true,
            session: SessionConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Aggregate counters over a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatchResults {
    /// Games played through to a record, whatever their outcome.
    pub games_completed: u32,
    /// Illegal moves across all games.
    pub illegal_total: u32,
    /// Engine crashes across all games.
    pub crash_total: u32,
    /// Games classified `error`.
    pub games_errored: u32,
    /// Games ended by an illegal move.
    pub games_illegal: u32,
}

impl MatchResults {
    /// Fold one finished game into the totals.
    pub fn record(&mut self, game: &GameRecord) {
        self.games_completed += 1;
        self.illegal_total += game.illegal_moves;
        match game.outcome {
            GameOutcome::Completed => {}
            GameOutcome::Error => self.games_errored += 1,
            GameOutcome::Illegal => self.games_illegal += 1,
            GameOutcome::Crashed => self.crash_total += 1,
        }
    }

    /// `true` iff no illegal move was observed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.illegal_total == 0
    }

    /// `PASS` or `FAIL`.
    #[must_use]
    pub fn conclusion(&self) -> &'static str {
        if self.passed() {
            "PASS"
        } else {
            "FAIL"
        }
    }

    /// The four-line summary printed at the end of a run.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Games completed: {}", self.games_completed);
        let _ = writeln!(out, "Illegal moves: {}", self.illegal_total);
        let _ = writeln!(out, "Crashes: {}", self.crash_total);
        let _ = writeln!(out, "Conclusion: {}", self.conclusion());
        out
    }
}

/// Full account of one match run.
#[derive(Debug, Serialize)]
pub struct MatchReport {
    /// Unique identifier for this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Games the run was asked to play.
    pub games_requested: u32,
    /// Aggregate counters.
    pub results: MatchResults,
    /// Per-game records in play order.
    pub games: Vec<GameRecord>,
    /// Reason the run stopped early, if it did.
    pub aborted: Option<String>,
    /// The fatal error behind `aborted`.
    #[serde(skip)]
    pub error: Option<HarnessError>,
}

impl MatchReport {
    fn new(games_requested: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            games_requested,
            results: MatchResults::default(),
            games: Vec::new(),
            aborted: None,
            error: None,
        }
    }

    /// Whether a fatal error stopped the run.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// `HarnessError::Io` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| HarnessError::Io(format!("failed to serialize report: {err}")))
    }

    /// Write the JSON report to `path`.
    ///
    /// # Errors
    ///
    /// `HarnessError::Io` if serialization or the write fails.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path.as_ref(), json).map_err(|err| {
            HarnessError::Io(format!(
                "failed to write report {}: {err}",
                path.as_ref().display()
            ))
        })
    }

    /// Report for a run that failed before any engine was launched, such as
    /// a bad configuration or a failed compile.
    #[must_use]
    pub fn not_started(games_requested: u32, err: HarnessError) -> Self {
        let mut report = Self::new(games_requested);
        report.abort(err);
        report.finished_at = Some(report.started_at);
        report
    }

    fn abort(&mut self, err: HarnessError) {
        self.aborted = Some(err.to_string());
        self.error = Some(err);
    }
}

/// Runs matches between two engines.
#[derive(Debug, Clone)]
pub struct MatchRunner {
    config: MatchConfig,
}

impl MatchRunner {
    /// Create a runner with the given settings.
    #[must_use]
    pub fn new(config: MatchConfig) -> Self {
        Self { config }
    }

    /// Play the configured number of games.
    ///
    /// Never fails: a fatal error stops the loop and is carried in the
    /// report. Every session that was created is terminated exactly once
    /// before this returns.
    pub async fn run<F: EngineFactory>(&self, factory: &mut F) -> MatchReport {
        let mut report = MatchReport::new(self.config.games);
        let span = info_span!("match", run_id = %report.run_id, games = self.config.games);

        async {
            let mut seats: Vec<ProtocolSession> = Vec::with_capacity(2);
            let status = self.drive(factory, &mut seats, &mut report).await;

            if let Err(err) = status {
                error!(%err, "match aborted");
                for session in &mut seats {
                    log_diagnostics(session);
                }
                report.abort(err);
            }

            for session in &mut seats {
                session.terminate().await;
            }
        }
        .instrument(span)
        .await;

        report.finished_at = Some(Utc::now());
        report
    }

    async fn drive<F: EngineFactory>(
        &self,
        factory: &mut F,
        seats: &mut Vec<ProtocolSession>,
        report: &mut MatchReport,
    ) -> Result<()> {
        for seat in [Seat::A, Seat::B] {
            let process = factory.launch(seat)?;
            // Owned by `seats` before the handshake so a failing handshake
            // still reaches the cleanup in `run`.
            seats.push(ProtocolSession::new(process, self.config.session.clone()));
            seats[seat.index()].initialize().await?;
        }

        let orchestrator = GameOrchestrator::new(self.config.game.clone());
        let games = self.config.games;
        for game in 1..=games {
            let record = {
                let (first, second) = seats.split_at_mut(1);
                orchestrator.play(&mut first[0], &mut second[0]).await?
            };

            info!(
                game,
                outcome = %record.outcome,
                plies = record.moves.len(),
                illegal = record.illegal_moves,
                "Game {game}/{games}: {}",
                record.outcome
            );
            report.results.record(&record);
            let crashed = match record.outcome {
                GameOutcome::Crashed => record.faulted_seat,
                _ => None,
            };
            report.games.push(record);

            if game == games {
                break;
            }
            if let Some(seat) = crashed {
                self.restart(factory, seats, seat).await?;
            }
            for seat in [Seat::A, Seat::B] {
                match seats[seat.index()].new_game().await {
                    Ok(()) => {}
                    Err(HarnessError::Crash(reason)) => {
                        warn!(engine = %seat, %reason, "engine crashed between games");
                        report.results.crash_total += 1;
                        self.restart(factory, seats, seat).await?;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }

    /// Replace a crashed engine with a fresh, handshaken one.
    async fn restart<F: EngineFactory>(
        &self,
        factory: &mut F,
        seats: &mut [ProtocolSession],
        seat: Seat,
    ) -> Result<()> {
        if !self.config.restart_crashed {
            return Err(HarnessError::Crash(format!(
                "engine {seat} crashed and restarts are disabled"
            )));
        }
        let slot = &mut seats[seat.index()];
        slot.terminate().await;
        warn!(engine = %seat, "restarting crashed engine");

        let process = factory.launch(seat)?;
        *slot = ProtocolSession::new(process, self.config.session.clone());
        slot.initialize().await
    }
}

fn log_diagnostics(session: &mut ProtocolSession) {
    let lines = session.diagnostics();
    let skip = lines.len().saturating_sub(ABORT_DIAGNOSTIC_LINES);
    for line in &lines[skip..] {
        warn!(engine = %session.label(), line = %line, "recent engine output");
    }
}
