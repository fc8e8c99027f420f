//! Harness configuration parsing and validation.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::build::BuildSpec;
use crate::engine::session::{EngineOption, SessionConfig};
use crate::engine::supervisor::EngineCommand;
use crate::game::orchestrator::GameConfig;
use crate::game::record::Seat;
use crate::runner::MatchConfig;
use crate::{HarnessError, Result};

/// Timeout values bounding every blocking engine interaction.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutConfig {
    /// Budget for each handshake phase (banner, `uciok`, `readyok`).
    #[serde(default = "default_handshake_seconds")]
    pub handshake_seconds: u64,
    /// Budget for a single `go` request to produce `bestmove`.
    #[serde(default = "default_move_seconds")]
    pub move_seconds: u64,
    /// Grace period between `quit` and a forced kill.
    #[serde(default = "default_shutdown_millis")]
    pub shutdown_millis: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_seconds: default_handshake_seconds(),
            move_seconds: default_move_seconds(),
            shutdown_millis: default_shutdown_millis(),
        }
    }
}

fn default_handshake_seconds() -> u64 {
    10
}

fn default_move_seconds() -> u64 {
    30
}

fn default_shutdown_millis() -> u64 {
    500
}

fn default_games() -> u32 {
    20
}

fn default_ply_cap() -> u32 {
    120
}

fn default_depth() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_max_line_bytes() -> usize {
    crate::engine::codec::DEFAULT_MAX_LINE_BYTES
}

/// Options sent to every engine after `uciok`.
fn default_options() -> Vec<EngineOption> {
    vec![
        EngineOption::new("HumanSelect", "false"),
        EngineOption::new("DebugEvalTrace", "false"),
        EngineOption::new("PersonalityAutoLoad", "false"),
    ]
}

/// Harness configuration parsed from a TOML file or assembled from CLI flags.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// Engine executable for seat A (and seat B unless `engine_b` is set).
    #[serde(default)]
    pub engine: PathBuf,
    /// Optional different executable for seat B.
    #[serde(default)]
    pub engine_b: Option<PathBuf>,
    /// Working directory for engine processes; defaults to the engine's folder.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Extra arguments passed to the engine executable.
    #[serde(default)]
    pub engine_args: Vec<String>,
    /// Number of games to play.
    #[serde(default = "default_games")]
    pub games: u32,
    /// Maximum half-moves per game.
    #[serde(default = "default_ply_cap")]
    pub ply_cap: u32,
    /// Search depth passed with every `go`.
    #[serde(default = "default_depth")]
    pub depth: u32,
    /// Substrings identifying the startup banner; empty skips the banner wait.
    #[serde(default)]
    pub banner_tokens: Vec<String>,
    /// Check every returned move against the current position.
    #[serde(default = "default_true")]
    pub validate_moves: bool,
    /// Respawn an engine that crashed mid-game instead of aborting.
    #[serde(default = "default_true")]
    pub restart_crashed: bool,
    /// Longest engine output line accepted before the session fails.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// `setoption` directives applied during the handshake, in order.
    #[serde(default = "default_options")]
    pub options: Vec<EngineOption>,
    /// Timeouts for blocking reads.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Optional compile step producing the engine executable.
    #[serde(default)]
    pub build: Option<BuildSpec>,
}

impl HarnessConfig {
    /// Configuration with every default applied for the given engine.
    #[must_use]
    pub fn for_engine(engine: impl Into<PathBuf>) -> Self {
        Self {
            engine: engine.into(),
            engine_b: None,
            working_dir: None,
            engine_args: Vec::new(),
            games: default_games(),
            ply_cap: default_ply_cap(),
            depth: default_depth(),
            banner_tokens: Vec::new(),
            validate_moves: true,
            restart_crashed: true,
            max_line_bytes: default_max_line_bytes(),
            options: default_options(),
            timeouts: TimeoutConfig::default(),
            build: None,
        }
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| HarnessError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the harness relies on.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.engine.as_os_str().is_empty() && self.build.is_none() {
            return Err(HarnessError::Config(
                "engine must be set unless a [build] section produces it".into(),
            ));
        }
        if self.games == 0 {
            return Err(HarnessError::Config(
                "games must be greater than zero".into(),
            ));
        }
        if self.ply_cap == 0 {
            return Err(HarnessError::Config(
                "ply_cap must be greater than zero".into(),
            ));
        }
        if self.depth == 0 {
            return Err(HarnessError::Config(
                "depth must be greater than zero".into(),
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(HarnessError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }
        if self.timeouts.handshake_seconds == 0 || self.timeouts.move_seconds == 0 {
            return Err(HarnessError::Config(
                "handshake and move timeouts must be greater than zero".into(),
            ));
        }
        if let Some(option) = self.options.iter().find(|o| o.name.trim().is_empty()) {
            return Err(HarnessError::Config(format!(
                "option name must not be empty (value {:?})",
                option.value
            )));
        }
        Ok(())
    }

    /// Process launch parameters for the given seat.
    #[must_use]
    pub fn engine_command(&self, seat: Seat) -> EngineCommand {
        let program = match (seat, &self.engine_b) {
            (Seat::B, Some(engine_b)) => engine_b.clone(),
            _ => self.engine.clone(),
        };
        let working_dir = self.working_dir.clone().or_else(|| {
            program
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map(Path::to_path_buf)
        });
        EngineCommand {
            label: seat.to_string(),
            program,
            args: self.engine_args.clone(),
            working_dir,
        }
    }

    /// Protocol settings shared by both sessions.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            banner_tokens: self.banner_tokens.clone(),
            options: self.options.clone(),
            depth: self.depth,
            handshake_timeout: Duration::from_secs(self.timeouts.handshake_seconds),
            move_timeout: Duration::from_secs(self.timeouts.move_seconds),
            shutdown_grace: Duration::from_millis(self.timeouts.shutdown_millis),
            max_line_bytes: self.max_line_bytes,
        }
    }

    /// Settings for the match loop.
    #[must_use]
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            games: self.games,
            restart_crashed: self.restart_crashed,
            session: self.session_config(),
            game: GameConfig {
                ply_cap: self.ply_cap,
                validate_moves: self.validate_moves,
            },
        }
    }
}
