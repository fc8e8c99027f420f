//! Optional compile step that produces the engine executable.
//!
//! Runs a single compiler invocation of the form
//! `compiler <flags> -o <output> <sources> <link_flags>` and checks that the
//! output file exists afterwards.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{HarnessError, Result};

fn default_compiler() -> String {
    "g++".into()
}

fn default_flags() -> Vec<String> {
    ["-O2", "-DNDEBUG", "-std=c++17"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// How to compile the engine before a run.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BuildSpec {
    /// Compiler executable.
    #[serde(default = "default_compiler")]
    pub compiler: String,
    /// Source files, relative to `working_dir` when set.
    pub sources: Vec<PathBuf>,
    /// Flags placed before `-o`.
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,
    /// Output executable path.
    pub output: PathBuf,
    /// Directory the compiler runs in.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Flags placed after the sources (libraries).
    #[serde(default)]
    pub link_flags: Vec<String>,
}

impl BuildSpec {
    /// Full argument list passed to the compiler.
    #[must_use]
    pub fn arguments(&self) -> Vec<String> {
        let mut args = self.flags.clone();
        args.push("-o".into());
        args.push(self.output.display().to_string());
        args.extend(self.sources.iter().map(|s| s.display().to_string()));
        args.extend(self.link_flags.iter().cloned());
        args
    }

    /// Where the executable ends up, resolved against `working_dir`.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) if self.output.is_relative() => dir.join(&self.output),
            _ => self.output.clone(),
        }
    }
}

/// Compile the engine and return the path of the produced executable.
///
/// # Errors
///
/// Returns `HarnessError::Build` if there are no sources, the compiler
/// cannot be launched, exits unsuccessfully, or leaves no output file.
pub async fn build(spec: &BuildSpec) -> Result<PathBuf> {
    if spec.sources.is_empty() {
        return Err(HarnessError::Build("no source files to compile".into()));
    }

    let args = spec.arguments();
    info!(compiler = %spec.compiler, sources = spec.sources.len(), "compiling engine");
    debug!(args = ?args, "compiler arguments");

    let mut cmd = Command::new(&spec.compiler);
    cmd.args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &spec.working_dir {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|err| {
        HarnessError::Build(format!("failed to run {}: {err}", spec.compiler))
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!(status = %output.status, "compilation failed");
        return Err(HarnessError::Build(format!(
            "{} exited with {}: {}",
            spec.compiler,
            output.status,
            stderr.trim()
        )));
    }

    let produced = spec.output_path();
    if !produced.is_file() {
        return Err(HarnessError::Build(format!(
            "compiler succeeded but {} was not produced",
            produced.display()
        )));
    }
    info!(output = %produced.display(), "engine compiled");
    Ok(produced)
}

/// Run `compiler --version` and return the first line of its output.
///
/// # Errors
///
/// Returns `HarnessError::Build` if the compiler is missing or reports an
/// error.
pub async fn probe_compiler(compiler: impl AsRef<Path>) -> Result<String> {
    let compiler = compiler.as_ref();
    let output = Command::new(compiler)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| {
            HarnessError::Build(format!("compiler {} not found: {err}", compiler.display()))
        })?;
    if !output.status.success() {
        return Err(HarnessError::Build(format!(
            "{} --version exited with {}",
            compiler.display(),
            output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_owned())
}
