#![forbid(unsafe_code)]

//! `uci-gauntlet` binary.
//!
//! Loads configuration, optionally compiles the engine, plays the match, and
//! prints the results summary. Exit status is 0 on PASS, 1 on FAIL, and 2
//! when the run could not be completed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use uci_gauntlet::build;
use uci_gauntlet::runner::{ExecutableFactory, MatchReport, MatchRunner};
use uci_gauntlet::{HarnessConfig, HarnessError, Result};

const EXIT_FAIL: u8 = 1;
const EXIT_ABORTED: u8 = 2;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "uci-gauntlet", about = "UCI engine legality harness", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, required_unless_present = "engine")]
    config: Option<PathBuf>,

    /// Engine executable (overrides the config file).
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Different engine executable for the second seat.
    #[arg(long)]
    engine_b: Option<PathBuf>,

    /// Number of games to play.
    #[arg(long)]
    games: Option<u32>,

    /// Search depth sent with every `go`.
    #[arg(long)]
    depth: Option<u32>,

    /// Maximum half-moves per game.
    #[arg(long)]
    ply_cap: Option<u32>,

    /// Accept any well-formed move without checking the position.
    #[arg(long)]
    no_validate: bool,

    /// Write a JSON report to this path.
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> ExitCode {
    let args = Cli::parse();
    if let Err(err) = init_tracing(args.log_format) {
        eprintln!("{err}");
        return ExitCode::from(EXIT_ABORTED);
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(%err, "failed to build tokio runtime");
            return ExitCode::from(EXIT_ABORTED);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(report) if report.is_aborted() => ExitCode::from(EXIT_ABORTED),
        Ok(report) if report.results.passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_FAIL),
        Err(err) => {
            error!(%err, "run failed");
            ExitCode::from(EXIT_ABORTED)
        }
    }
}

async fn run(args: Cli) -> Result<MatchReport> {
    let report = match prepare(&args).await {
        Ok(config) => {
            let runner = MatchRunner::new(config.match_config());
            let mut factory = ExecutableFactory::from_config(&config);
            runner.run(&mut factory).await
        }
        Err(err) => MatchReport::not_started(args.games.unwrap_or_default(), err),
    };

    println!("\n=== Results ===");
    print!("{}", report.results.summary());

    if let Some(path) = &args.report_json {
        report.write_json(path)?;
        info!(path = %path.display(), "report written");
    }
    if let Some(err) = &report.error {
        error!(%err, games = report.games.len(), "match aborted");
    }
    Ok(report)
}

/// Load the configuration and run the optional compile step.
async fn prepare(args: &Cli) -> Result<HarnessConfig> {
    let mut config = load_config(args)?;

    if let Some(spec) = &config.build {
        let version = build::probe_compiler(&spec.compiler).await?;
        info!(compiler = %spec.compiler, %version, "compiler found");
        config.engine = build::build(spec).await?;
    }
    info!(engine = %config.engine.display(), games = config.games, "configuration loaded");
    Ok(config)
}

/// Read the config file (if any) and apply command-line overrides.
fn load_config(args: &Cli) -> Result<HarnessConfig> {
    let mut config = match (&args.config, &args.engine) {
        (Some(path), _) => HarnessConfig::load_from_path(path)?,
        (None, Some(engine)) => HarnessConfig::for_engine(engine),
        (None, None) => {
            return Err(HarnessError::Config(
                "either --config or --engine is required".into(),
            ))
        }
    };

    if let Some(engine) = &args.engine {
        config.engine.clone_from(engine);
    }
    if args.engine_b.is_some() {
        config.engine_b.clone_from(&args.engine_b);
    }
    if let Some(games) = args.games {
        config.games = games;
    }
    if let Some(depth) = args.depth {
        config.depth = depth;
    }
    if let Some(ply_cap) = args.ply_cap {
        config.ply_cap = ply_cap;
    }
    if args.no_validate {
        config.validate_moves = false;
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| HarnessError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| HarnessError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
