//! Async version check with timeout.

use crate::ProbeError;
use std::ffi::OsStr;
use std::ffi::OsString;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Invoke a tool's version flag and capture its output.
///
/// The invocation is wrapped in a timeout to avoid hanging on stuck
/// processes. When `path_env` is given, it replaces the child's `PATH` so
/// directories resolved earlier in the run are searched too.
///
/// # Returns
///
/// `Ok(String)` with the version output (stdout preferred, stderr
/// fallback), or a `ProbeError`:
/// - `Timeout` if the command exceeds the deadline
/// - `PermissionDenied` if the executable cannot be run due to permissions
/// - `IoError` for other I/O failures or non-zero exit codes
/// - `VersionParseFailed` if the output is not valid UTF-8
pub(crate) async fn check_version(
    program: &OsStr,
    args: &[&str],
    deadline: Duration,
    path_env: Option<&OsString>,
) -> Result<String, ProbeError> {
    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(path) = path_env {
        command.env("PATH", path);
    }

    let output = timeout(deadline, command.output())
        .await
        .map_err(|_| ProbeError::Timeout)?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::PermissionDenied {
                ProbeError::PermissionDenied
            } else {
                ProbeError::IoError
            }
        })?;

    if !output.status.success() {
        return Err(ProbeError::IoError);
    }

    // Try stdout first, fall back to stderr (some tools write version to stderr)
    let out = if !output.stdout.is_empty() {
        output.stdout
    } else {
        output.stderr
    };

    String::from_utf8(out).map_err(|_| ProbeError::VersionParseFailed)
}
