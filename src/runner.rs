//! Streaming subprocess runner.
//!
//! Installers run for minutes and print as they go; this module surfaces
//! their output line by line instead of waiting for exit, so the consumer
//! of the event stream never sees a frozen log during a long install.

use crate::events::EventSender;
use crate::ResolvedPaths;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Errors from launching or supervising a subprocess.
///
/// A non-zero exit code is deliberately *not* an error here: the runner
/// returns the [`ExitStatus`] and the caller decides what the code means.
/// `Spawn` is the distinct "binary not found / not runnable" case.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The program could not be launched at all.
    #[error("failed to launch {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying launch error.
        source: std::io::Error,
    },

    /// I/O error while supervising the child process.
    #[error("i/o error while running subprocess: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled and the child was killed.
    #[error("subprocess cancelled")]
    Cancelled,
}

/// A structured command: program, argument vector, extra environment.
///
/// Built with plain argument vectors rather than shell strings, so nothing
/// the pipeline runs passes through a shell except where the platform
/// leaves no choice (privilege-escalation prompts).
#[derive(Debug, Clone)]
pub(crate) struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub envs: Vec<(String, OsString)>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub(crate) fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub(crate) fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// One-line rendering for the log.
    pub(crate) fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }

    fn to_command(&self, resolved: &ResolvedPaths) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command.env("PATH", resolved.path_env());
        for (key, value) in &self.envs {
            command.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// Run a command, streaming both output streams into the log.
///
/// Both stdout and stderr are piped (never inherited) and drained by two
/// concurrent tasks that push trimmed non-empty lines to the log as they
/// arrive. Both drains finish before the runner waits on exit, so output
/// buffered by a fast-exiting process is never lost. Lines from the two
/// streams may interleave, but each stream's own order is preserved.
///
/// Cancellation kills the child promptly and returns [`RunError::Cancelled`].
pub(crate) async fn run_streaming(
    spec: &CommandSpec,
    resolved: &ResolvedPaths,
    events: &EventSender,
    cancel: &CancellationToken,
) -> Result<ExitStatus, RunError> {
    if cancel.is_cancelled() {
        return Err(RunError::Cancelled);
    }

    let mut command = spec.to_command(resolved);
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(command = %spec.display(), "spawning subprocess");
    let mut child = command.spawn().map_err(|source| RunError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RunError::Io(std::io::Error::other("stdout was not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RunError::Io(std::io::Error::other("stderr was not captured")))?;

    let out_task = tokio::spawn(drain_lines(stdout, events.clone()));
    let err_task = tokio::spawn(drain_lines(stderr, events.clone()));

    // Both streams must reach EOF before waiting on exit; killing the child
    // on cancellation closes the pipes and unblocks the drains.
    let drains = async {
        let _ = tokio::join!(out_task, err_task);
    };
    tokio::select! {
        () = drains => {}
        () = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(RunError::Cancelled);
        }
    }

    tokio::select! {
        status = child.wait() => return Ok(status?),
        () = cancel.cancelled() => {}
    }

    // Token fired while the child was still running.
    let _ = child.start_kill();
    let _ = child.wait().await;
    Err(RunError::Cancelled)
}

/// Run a short command to completion, returning its combined output.
///
/// For quick non-interactive invocations (registry edits, `setx`,
/// `osascript`) where line streaming adds nothing.
pub(crate) async fn run_captured(
    spec: &CommandSpec,
    resolved: &ResolvedPaths,
) -> Result<(ExitStatus, String), RunError> {
    let mut command = spec.to_command(resolved);
    command.kill_on_drop(true);

    let output = command.output().await.map_err(|source| RunError::Spawn {
        program: spec.program.clone(),
        source,
    })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
    }
    Ok((output.status, combined))
}

async fn drain_lines<R>(stream: R, events: EventSender)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if !line.is_empty() {
                    events.log(line);
                }
            }
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(%error, "error reading subprocess output line");
                break;
            }
        }
    }
}
