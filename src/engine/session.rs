//! UCI protocol session: handshake and turn-taking state machine.
//!
//! A session wraps one [`EngineProcess`] and walks it through the handshake:
//!
//! 1. **welcome**: optionally wait for a startup banner line.
//! 2. **`uci`**: negotiate the protocol; wait for the exact line `uciok`.
//! 3. **`setoption`**: apply the configured options; no acknowledgment.
//! 4. **`isready`**: wait for the exact line `readyok`.
//!
//! After that the session alternates `Ready ⇄ Thinking` for each `go`.
//! Traffic is strictly half-duplex: one command, then one awaited response.
//! Every wait is terminated by an exact sentinel match and bounded by a
//! deadline; unrelated lines in between (`id`, `option`, `info`, banners) are
//! kept as diagnostics and otherwise ignored.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::engine::codec::DEFAULT_MAX_LINE_BYTES;
use crate::engine::supervisor::EngineProcess;
use crate::game::moves::MoveHistory;
use crate::{HarnessError, Result};

/// Negotiation sentinel.
pub const UCI_OK: &str = "uciok";
/// Readiness sentinel.
pub const READY_OK: &str = "readyok";
/// Marker prefixing the move-result line.
pub const BEST_MOVE: &str = "bestmove";
/// Move token meaning "no legal move available".
pub const NO_MOVE: &str = "(none)";

/// Diagnostic lines retained per session.
const MAX_DIAGNOSTIC_LINES: usize = 64;

/// Lifecycle state of a [`ProtocolSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Process spawned, nothing exchanged yet.
    Uninitialized,
    /// Startup banner consumed (or none configured).
    WelcomeConsumed,
    /// `uciok` observed.
    UciNegotiated,
    /// `setoption` directives written.
    OptionsApplied,
    /// `readyok` observed; commands may be issued.
    Ready,
    /// `go` sent, waiting for `bestmove`.
    Thinking,
    /// Process terminated; no further commands allowed.
    Terminated,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::WelcomeConsumed => "welcome_consumed",
            Self::UciNegotiated => "uci_negotiated",
            Self::OptionsApplied => "options_applied",
            Self::Ready => "ready",
            Self::Thinking => "thinking",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// One `setoption name <K> value <V>` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOption {
    /// Option name as advertised by the engine.
    pub name: String,
    /// Option value.
    pub value: String,
}

impl EngineOption {
    /// Build an option directive.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// The wire command for this option.
    #[must_use]
    pub fn command(&self) -> String {
        format!("setoption name {} value {}", self.name, self.value)
    }
}

/// Protocol settings for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Substrings identifying the startup banner; empty skips the wait.
    pub banner_tokens: Vec<String>,
    /// Options applied after `uciok`.
    pub options: Vec<EngineOption>,
    /// Depth sent with every `go`.
    pub depth: u32,
    /// Deadline for each handshake phase.
    pub handshake_timeout: Duration,
    /// Deadline for each `go` request.
    pub move_timeout: Duration,
    /// Grace period for process exit checks and shutdown.
    pub shutdown_grace: Duration,
    /// Longest accepted engine output line.
    pub max_line_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            banner_tokens: Vec::new(),
            options: Vec::new(),
            depth: 1,
            handshake_timeout: Duration::from_secs(10),
            move_timeout: Duration::from_secs(30),
            shutdown_grace: Duration::from_millis(500),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Answer to a `go` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveReply {
    /// The first token after `bestmove`.
    Move(String),
    /// The engine answered `bestmove (none)`.
    NoLegalMove,
}

/// Outcome of one bounded read.
enum Line {
    Text(String),
    Eof,
    TimedOut,
}

/// UCI state machine over one engine process.
#[derive(Debug)]
pub struct ProtocolSession {
    process: EngineProcess,
    config: SessionConfig,
    state: SessionState,
    saw_uciok: bool,
    saw_readyok: bool,
    stream_closed: bool,
    diagnostics: VecDeque<String>,
}

impl ProtocolSession {
    /// Wrap a freshly spawned process.
    #[must_use]
    pub fn new(process: EngineProcess, config: SessionConfig) -> Self {
        let process = process.with_max_line_bytes(config.max_line_bytes);
        Self {
            process,
            config,
            state: SessionState::Uninitialized,
            saw_uciok: false,
            saw_readyok: false,
            stream_closed: false,
            diagnostics: VecDeque::new(),
        }
    }

    /// Engine label used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        self.process.label()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether both handshake sentinels have been observed.
    #[must_use]
    pub fn handshake_complete(&self) -> bool {
        self.saw_uciok && self.saw_readyok
    }

    /// Recent non-protocol output: skipped stdout lines and stderr.
    pub fn diagnostics(&mut self) -> Vec<String> {
        for line in self.process.drain_stderr() {
            self.remember(line);
        }
        self.diagnostics.iter().cloned().collect()
    }

    /// Run the full handshake and leave the session `Ready`.
    ///
    /// # Errors
    ///
    /// - `HarnessError::Protocol`: the engine closed its output, timed out,
    ///   or produced an invalid line before a sentinel, or a write failed.
    pub async fn initialize(&mut self) -> Result<()> {
        self.expect_state(SessionState::Uninitialized, "initialize")?;

        self.consume_welcome().await?;
        self.state = SessionState::WelcomeConsumed;

        self.send("uci").await?;
        self.wait_for("uci negotiation", UCI_OK, |line| line == UCI_OK)
            .await?;
        self.saw_uciok = true;
        self.state = SessionState::UciNegotiated;

        let options = self.config.options.clone();
        for option in &options {
            self.send(&option.command()).await?;
        }
        self.state = SessionState::OptionsApplied;

        self.sync_ready().await?;
        info!(engine = %self.label(), "handshake complete");
        Ok(())
    }

    /// Send `isready` and wait for `readyok`.
    ///
    /// # Errors
    ///
    /// `HarnessError::Protocol` if `readyok` is not observed.
    pub async fn sync_ready(&mut self) -> Result<()> {
        if self.state != SessionState::OptionsApplied {
            self.expect_state(SessionState::Ready, "isready")?;
        }
        self.send("isready").await?;
        self.wait_for("readiness probe", READY_OK, |line| line == READY_OK)
            .await?;
        self.saw_readyok = true;
        if self.saw_uciok {
            self.state = SessionState::Ready;
        }
        Ok(())
    }

    /// Replace the engine's position with the start position plus `history`.
    ///
    /// # Errors
    ///
    /// - `HarnessError::Crash`: the process has exited.
    /// - `HarnessError::Protocol`: the session is not ready or the write fails.
    pub async fn set_position(&mut self, history: &MoveHistory) -> Result<()> {
        self.expect_state(SessionState::Ready, "position")?;
        let command = if history.is_empty() {
            "position startpos".to_owned()
        } else {
            format!("position startpos moves {history}")
        };
        self.send(&command).await
    }

    /// Reset logical game state with `ucinewgame`; the process keeps running.
    ///
    /// # Errors
    ///
    /// - `HarnessError::Crash`: the process has exited.
    /// - `HarnessError::Protocol`: the session is not ready or the write fails.
    pub async fn new_game(&mut self) -> Result<()> {
        self.expect_state(SessionState::Ready, "ucinewgame")?;
        self.send("ucinewgame").await
    }

    /// Ask for a move at the configured depth.
    ///
    /// # Errors
    ///
    /// - `HarnessError::MissingMove`: end of stream, timeout, or a
    ///   `bestmove` line without a move token.
    /// - `HarnessError::Crash`: the process has exited (end of stream or a
    ///   failed write).
    /// - `HarnessError::Protocol`: the session is not ready, a write failed,
    ///   or the engine stayed silent after a timed-out search was stopped.
    pub async fn request_move(&mut self) -> Result<MoveReply> {
        self.expect_state(SessionState::Ready, "go")?;
        let command = format!("go depth {}", self.config.depth);
        self.send(&command).await?;
        self.state = SessionState::Thinking;

        let deadline = Instant::now() + self.config.move_timeout;
        loop {
            match self.next_line(deadline).await? {
                Line::Text(line) => {
                    if let Some(reply) = parse_best_move(&line) {
                        self.state = SessionState::Ready;
                        trace!(engine = %self.label(), line = %line, "bestmove received");
                        return reply.ok_or_else(|| {
                            HarnessError::MissingMove(format!(
                                "engine {} sent '{line}' without a move",
                                self.label()
                            ))
                        });
                    }
                    self.remember(line);
                }
                Line::Eof => {
                    self.state = SessionState::Ready;
                    let grace = self.config.shutdown_grace;
                    if let Some(status) = self.process.exit_status(grace).await {
                        warn!(engine = %self.label(), %status, "engine exited while thinking");
                        return Err(HarnessError::Crash(format!(
                            "engine {} exited while thinking ({status})",
                            self.label()
                        )));
                    }
                    return Err(HarnessError::MissingMove(format!(
                        "engine {} closed its output before {BEST_MOVE}",
                        self.label()
                    )));
                }
                Line::TimedOut => {
                    warn!(
                        engine = %self.label(),
                        timeout = ?self.config.move_timeout,
                        "no bestmove in time, stopping search"
                    );
                    self.recover_from_timeout().await?;
                    return Err(HarnessError::MissingMove(format!(
                        "engine {} produced no {BEST_MOVE} within {:?}",
                        self.label(),
                        self.config.move_timeout
                    )));
                }
            }
        }
    }

    /// Terminate the engine process. Idempotent; returns `true` only for the
    /// call that performed the shutdown.
    pub async fn terminate(&mut self) -> bool {
        self.state = SessionState::Terminated;
        self.process.terminate(self.config.shutdown_grace).await
    }

    // ── Private helpers ──────────────────────────────────────────────────────

    /// Wait for a banner line if banner tokens are configured.
    async fn consume_welcome(&mut self) -> Result<()> {
        if self.config.banner_tokens.is_empty() {
            return Ok(());
        }
        let tokens = self.config.banner_tokens.clone();
        self.wait_for("welcome", "startup banner", |line| {
            tokens.iter().any(|token| line.contains(token.as_str()))
        })
        .await
    }

    /// Send `stop` after a timed-out `go` and discard the late `bestmove`,
    /// so the next request does not read a stale answer.
    async fn recover_from_timeout(&mut self) -> Result<()> {
        self.send("stop").await?;
        let result = self
            .wait_for("stop after timeout", BEST_MOVE, |line| {
                parse_best_move(line).is_some()
            })
            .await;
        self.state = SessionState::Ready;
        result
    }

    /// Read lines until `matches` accepts one, keeping skipped lines as
    /// diagnostics. End of stream and deadline expiry are protocol errors.
    async fn wait_for<F>(&mut self, phase: &str, expected: &str, matches: F) -> Result<()>
    where
        F: Fn(&str) -> bool,
    {
        let deadline = Instant::now() + self.config.handshake_timeout;
        loop {
            match self.next_line(deadline).await? {
                Line::Text(line) => {
                    if matches(line.trim()) {
                        debug!(engine = %self.label(), phase, "sentinel observed");
                        return Ok(());
                    }
                    self.remember(line);
                }
                Line::Eof => {
                    return Err(HarnessError::Protocol(format!(
                        "engine {} closed its output before '{expected}' during {phase}",
                        self.label()
                    )));
                }
                Line::TimedOut => {
                    return Err(HarnessError::Protocol(format!(
                        "timed out after {:?} waiting for '{expected}' during {phase} \
                         from engine {}",
                        self.config.handshake_timeout,
                        self.label()
                    )));
                }
            }
        }
    }

    async fn next_line(&mut self, deadline: Instant) -> Result<Line> {
        if self.stream_closed {
            return Ok(Line::Eof);
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, self.process.next_line()).await {
            Err(_elapsed) => Ok(Line::TimedOut),
            Ok(Ok(Some(line))) => {
                trace!(engine = %self.label(), line = %line, "engine >>");
                Ok(Line::Text(line))
            }
            Ok(Ok(None)) => {
                self.stream_closed = true;
                Ok(Line::Eof)
            }
            Ok(Err(err)) => Err(err),
        }
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        if self.state == SessionState::Terminated {
            return Err(HarnessError::Protocol(format!(
                "engine {} is terminated; cannot send '{command}'",
                self.label()
            )));
        }
        if self.stream_closed {
            let err = HarnessError::Protocol(format!(
                "engine {} closed its output; cannot send '{command}'",
                self.label()
            ));
            return Err(self.classify_exit(command, err).await);
        }
        trace!(engine = %self.label(), command, "engine <<");
        match self.process.send_line(command).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.classify_exit(command, err).await),
        }
    }

    /// Turn a failed exchange into `Crash` when the process has exited.
    async fn classify_exit(&mut self, command: &str, err: HarnessError) -> HarnessError {
        match self.process.exit_status(self.config.shutdown_grace).await {
            Some(status) => {
                warn!(engine = %self.label(), %status, command, "engine exited");
                HarnessError::Crash(format!(
                    "engine {} exited before '{command}' ({status})",
                    self.label()
                ))
            }
            None => err,
        }
    }

    fn expect_state(&self, expected: SessionState, command: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HarnessError::Protocol(format!(
                "engine {} cannot accept '{command}' in state {} (expected {expected})",
                self.label(),
                self.state
            )))
        }
    }

    fn remember(&mut self, line: String) {
        if self.diagnostics.len() == MAX_DIAGNOSTIC_LINES {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(line);
    }
}

/// Parse a `bestmove` line.
///
/// Returns `None` when the line is not a move-result line, `Some(None)` when
/// the marker has no move token, and `Some(Some(reply))` otherwise.
fn parse_best_move(line: &str) -> Option<Option<MoveReply>> {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some(BEST_MOVE) {
        return None;
    }
    Some(tokens.next().map(|token| {
        if token == NO_MOVE {
            MoveReply::NoLegalMove
        } else {
            MoveReply::Move(token.to_owned())
        }
    }))
}
