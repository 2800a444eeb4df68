//! Platform strategy interface and shared install helpers.
//!
//! One strategy per operating system, selected once at startup. Everything
//! a strategy does is structured subprocess invocation; there is no
//! per-call-site switching on the OS anywhere else in the pipeline.

use crate::install::artifacts::CLI_PACKAGE;
use crate::install::InstallError;
use crate::pipeline::StepContext;
use crate::probe::probe_in_context;
use crate::runner::{run_streaming, CommandSpec};
use crate::{Dependency, ProbeStatus};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Settle time after an installer finishes, before re-probing.
///
/// Installers register PATH changes that take a moment to propagate.
const REPROBE_DELAY: Duration = Duration::from_millis(500);

/// Install behavior for one operating system.
#[async_trait]
pub(crate) trait PlatformStrategy: Send + Sync {
    /// OS identifier, matching `std::env::consts::OS`.
    fn os(&self) -> &'static str;

    /// Ensure a dependency is installed and usable.
    ///
    /// Contract shared by all strategies:
    /// 1. Re-probe first; a present, valid tool short-circuits as a no-op.
    /// 2. Install via artifact download or the native package manager.
    /// 3. Re-probe. "Installed but not detected" is a logged soft-success
    ///    (a fresh shell usually fixes PATH), not a failure.
    async fn install(&self, dep: Dependency, cx: &mut StepContext) -> Result<(), InstallError>;
}

/// The strategy for a named OS, if that OS is supported.
pub(crate) fn for_os(os: &str) -> Option<&'static dyn PlatformStrategy> {
    match os {
        "windows" => Some(&super::windows::WindowsStrategy),
        "macos" => Some(&super::macos::MacStrategy),
        "linux" => Some(&super::linux::LinuxStrategy),
        _ => None,
    }
}

/// The strategy for the OS this process is running on.
pub(crate) fn current() -> Option<&'static dyn PlatformStrategy> {
    for_os(std::env::consts::OS)
}

/// Probe and skip the install when the dependency is already usable.
pub(crate) async fn short_circuit_if_present(
    dep: Dependency,
    cx: &mut StepContext,
) -> Result<bool, InstallError> {
    let status = probe_in_context(dep, &cx.probe_options(), &mut cx.resolved, &cx.events).await;
    if status.is_usable() {
        cx.events
            .log(format!("{dep} is already installed, skipping"));
        return Ok(true);
    }
    Ok(false)
}

/// Re-probe after an install command reported success.
pub(crate) async fn confirm_install(
    dep: Dependency,
    cx: &mut StepContext,
) -> Result<(), InstallError> {
    sleep_cancellable(REPROBE_DELAY, &cx.cancel).await?;

    let status = probe_in_context(dep, &cx.probe_options(), &mut cx.resolved, &cx.events).await;
    match status {
        ProbeStatus::Found(meta) => {
            cx.events
                .log(format!("{dep} {} installed and verified", meta.version));
            Ok(())
        }
        ProbeStatus::VersionTooLow {
            found,
            required_major,
            ..
        } => Err(InstallError::VersionTooLow {
            dependency: dep,
            found,
            required_major,
        }),
        ProbeStatus::NotFound | ProbeStatus::Unknown { .. } => {
            // The installer reported success; the usual cause is a PATH
            // update that needs a new shell session.
            cx.events.log(format!(
                "{dep} installed, but not yet detected; a new terminal session may be required"
            ));
            Ok(())
        }
    }
}

/// Install the CLI tool with npm through the configured registry mirror.
pub(crate) async fn npm_install_cli(
    cx: &mut StepContext,
    npm_program: &str,
) -> Result<(), InstallError> {
    let registry_arg = format!("--registry={}", cx.options.npm_registry);
    let spec =
        CommandSpec::new(npm_program).args(["install", "-g", CLI_PACKAGE, registry_arg.as_str()]);

    cx.events.log(format!("running: {}", spec.display()));
    let status = run_streaming(&spec, &cx.resolved, &cx.events, &cx.cancel).await?;
    if !status.success() {
        return Err(InstallError::from_exit("npm install", status.code()));
    }
    Ok(())
}

/// Sleep that aborts promptly when the run is cancelled.
pub(crate) async fn sleep_cancellable(
    duration: Duration,
    cancel: &CancellationToken,
) -> Result<(), InstallError> {
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        () = cancel.cancelled() => Err(InstallError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_os_dispatch() {
        assert_eq!(for_os("windows").unwrap().os(), "windows");
        assert_eq!(for_os("macos").unwrap().os(), "macos");
        assert_eq!(for_os("linux").unwrap().os(), "linux");
        assert!(for_os("freebsd").is_none());
    }

    #[tokio::test]
    async fn test_sleep_cancellable_returns_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = sleep_cancellable(Duration::from_secs(60), &cancel).await;
        assert!(matches!(result, Err(InstallError::Cancelled)));
    }
}
