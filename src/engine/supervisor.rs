//! Engine process supervisor.
//!
//! Spawns engine executables with piped stdio and owns the resulting streams:
//! - stdout is framed into lines with [`UciCodec`].
//! - stderr is drained by a background task into tracing and a bounded
//!   diagnostics channel so a chatty engine never blocks on a full pipe.
//! - `kill_on_drop(true)` backs up [`EngineProcess::terminate`] if a caller
//!   unwinds before reaching its cleanup path.
//!
//! [`EngineProcess::from_streams`] builds a process around arbitrary async
//! streams, which lets in-memory engines stand in for real executables.

use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Encoder, FramedRead};
use tracing::{debug, info, warn};

use crate::engine::codec::UciCodec;
use crate::{HarnessError, Result};

/// Engine output stream type accepted by [`EngineProcess`].
pub type EngineReader = Box<dyn AsyncRead + Send + Unpin>;

/// Engine input stream type accepted by [`EngineProcess`].
pub type EngineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Maximum stderr lines buffered between diagnostics drains.
const STDERR_BUFFER: usize = 256;

/// Command written to the engine before its stdin is closed.
const QUIT: &str = "quit";

/// Launch parameters for one engine executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    /// Name used in logs and error messages.
    pub label: String,
    /// Executable path.
    pub program: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Directory the process starts in.
    pub working_dir: Option<PathBuf>,
}

/// A running engine and its byte streams.
pub struct EngineProcess {
    label: String,
    child: Option<Child>,
    stdin: Option<EngineWriter>,
    stdout: FramedRead<EngineReader, UciCodec>,
    encoder: UciCodec,
    stderr_rx: Option<mpsc::Receiver<String>>,
    stderr_task: Option<JoinHandle<()>>,
    terminated: bool,
}

impl Debug for EngineProcess {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineProcess")
            .field("label", &self.label)
            .field("pid", &self.id())
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

/// Spawn an engine executable with piped stdin, stdout and stderr.
///
/// # Errors
///
/// Returns `HarnessError::Spawn` if the executable is missing or cannot be
/// launched, or if one of its pipes cannot be captured.
pub fn spawn(command: &EngineCommand, max_line_bytes: usize) -> Result<EngineProcess> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &command.working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|err| {
        HarnessError::Spawn(format!(
            "failed to spawn {}: {err}",
            command.program.display()
        ))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| HarnessError::Spawn("failed to capture engine stdin".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| HarnessError::Spawn("failed to capture engine stdout".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| HarnessError::Spawn("failed to capture engine stderr".into()))?;

    info!(
        engine = %command.label,
        pid = child.id().unwrap_or(0),
        program = %command.program.display(),
        "engine process spawned"
    );

    let (stderr_tx, stderr_rx) = mpsc::channel(STDERR_BUFFER);
    let label = command.label.clone();
    let stderr_task = tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(engine = %label, line = %line, "engine stderr");
            // Drop lines rather than block the engine when nobody drains.
            let _ = stderr_tx.try_send(line);
        }
    });

    let mut process =
        EngineProcess::from_streams(&command.label, Box::new(stdout), Box::new(stdin))
            .with_max_line_bytes(max_line_bytes);
    process.child = Some(child);
    process.stderr_rx = Some(stderr_rx);
    process.stderr_task = Some(stderr_task);
    Ok(process)
}

impl EngineProcess {
    /// Wrap already-connected streams with no OS process behind them.
    #[must_use]
    pub fn from_streams(label: &str, stdout: EngineReader, stdin: EngineWriter) -> Self {
        Self {
            label: label.to_owned(),
            child: None,
            stdin: Some(stdin),
            stdout: FramedRead::new(stdout, UciCodec::new()),
            encoder: UciCodec::new(),
            stderr_rx: None,
            stderr_task: None,
            terminated: false,
        }
    }

    /// Replace the inbound line limit.
    #[must_use]
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        *self.stdout.decoder_mut() = UciCodec::with_max_length(max_line_bytes);
        self
    }

    /// Name used in logs.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// OS process id, if this is a live OS process.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Whether [`terminate`](Self::terminate) has already run.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Write one command line to the engine's stdin.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Protocol` if stdin is closed or the write fails
    /// (typically because the engine exited).
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            HarnessError::Protocol(format!("engine {} stdin is closed", self.label))
        })?;

        let mut buf = BytesMut::with_capacity(line.len() + 1);
        self.encoder.encode(line.to_owned(), &mut buf)?;

        stdin.write_all(&buf).await.map_err(|e| {
            HarnessError::Protocol(format!("write to engine {} failed: {e}", self.label))
        })?;
        stdin.flush().await.map_err(|e| {
            HarnessError::Protocol(format!("flush to engine {} failed: {e}", self.label))
        })?;
        Ok(())
    }

    /// Read the next stdout line; `Ok(None)` means end of stream.
    ///
    /// Cancel-safe: partially received lines stay buffered, so the future
    /// may be wrapped in a timeout and retried.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Protocol` for over-long lines and
    /// `HarnessError::Io` for read failures.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.stdout.next().await.transpose()
    }

    /// Collect stderr lines captured since the last call.
    pub fn drain_stderr(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(rx) = self.stderr_rx.as_mut() {
            while let Ok(line) = rx.try_recv() {
                lines.push(line);
            }
        }
        lines
    }

    /// Wait up to `wait` for the OS process to exit.
    ///
    /// Returns `None` for in-memory engines and for processes still running
    /// when the window closes.
    pub async fn exit_status(&mut self, wait: Duration) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match tokio::time::timeout(wait, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(err)) => {
                warn!(engine = %self.label, %err, "failed to poll engine process");
                None
            }
            Err(_elapsed) => None,
        }
    }

    /// Stop the engine: send `quit`, close stdin, wait `grace`, then kill.
    ///
    /// Idempotent. Returns `true` only for the call that actually performed
    /// the shutdown; succeeds when the process has already exited.
    pub async fn terminate(&mut self, grace: Duration) -> bool {
        if self.terminated {
            return false;
        }
        self.terminated = true;

        if let Some(mut stdin) = self.stdin.take() {
            let farewell = async {
                stdin.write_all(format!("{QUIT}\n").as_bytes()).await?;
                stdin.flush().await?;
                stdin.shutdown().await
            };
            match tokio::time::timeout(grace, farewell).await {
                Ok(Ok(())) => debug!(engine = %self.label, "quit sent"),
                Ok(Err(err)) => debug!(engine = %self.label, %err, "quit not delivered"),
                Err(_elapsed) => debug!(engine = %self.label, "quit write timed out"),
            }
        }

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    info!(engine = %self.label, %status, "engine process exited");
                }
                Ok(Err(err)) => {
                    warn!(engine = %self.label, %err, "error waiting for engine process");
                }
                Err(_elapsed) => {
                    warn!(engine = %self.label, ?grace, "engine ignored quit, killing");
                    if let Err(err) = child.kill().await {
                        warn!(engine = %self.label, %err, "failed to kill engine process");
                    }
                }
            }
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        info!(engine = %self.label, "engine terminated");
        true
    }
}
