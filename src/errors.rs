//! Error types shared across the harness.

use std::fmt::{Display, Formatter};

/// Shared harness result type.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Harness error enumeration covering every failure mode of a match.
///
/// The variants split into two groups. Fatal errors (`Config`, `Spawn`,
/// `Protocol`, `Build`, `Io`) abort the whole match. Per-game errors
/// (`MissingMove`, `IllegalMove`, `Crash`) degrade the current game and are
/// recorded in the match results.
#[derive(Debug)]
pub enum HarnessError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Engine executable missing or not launchable.
    Spawn(String),
    /// Stream ended, timed out, or misbehaved before an expected sentinel.
    Protocol(String),
    /// No `bestmove` line was produced for a `go` request.
    MissingMove(String),
    /// A returned move failed syntax or position-legality validation.
    IllegalMove(String),
    /// The engine process exited in the middle of a game.
    Crash(String),
    /// Compiler invocation failed.
    Build(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl HarnessError {
    /// Whether this error must abort the whole match.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MissingMove(_) | Self::IllegalMove(_) | Self::Crash(_)
        )
    }
}

impl Display for HarnessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Spawn(msg) => write!(f, "spawn: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::MissingMove(msg) => write!(f, "missing move: {msg}"),
            Self::IllegalMove(msg) => write!(f, "illegal move: {msg}"),
            Self::Crash(msg) => write!(f, "crash: {msg}"),
            Self::Build(msg) => write!(f, "build: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for HarnessError {}

impl From<toml::de::Error> for HarnessError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
