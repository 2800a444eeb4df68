//! Windows install strategy: staged installers run silently.

use crate::fetch::fetch;
use crate::install::artifacts::{GIT_WINDOWS_MIRRORS, NODE_MSI_MIRRORS, NODE_VERSION};
use crate::install::platform::{
    confirm_install, npm_install_cli, short_circuit_if_present, PlatformStrategy,
};
use crate::install::InstallError;
use crate::pipeline::StepContext;
use crate::runner::{run_streaming, CommandSpec};
use crate::Dependency;
use async_trait::async_trait;

pub(crate) struct WindowsStrategy;

#[async_trait]
impl PlatformStrategy for WindowsStrategy {
    fn os(&self) -> &'static str {
        "windows"
    }

    async fn install(&self, dep: Dependency, cx: &mut StepContext) -> Result<(), InstallError> {
        if short_circuit_if_present(dep, cx).await? {
            return Ok(());
        }

        match dep {
            Dependency::NodeJs => install_node_msi(cx).await?,
            Dependency::Git => install_git_exe(cx).await?,
            Dependency::ClaudeCli => npm_install_cli(cx, "npm.cmd").await?,
        }

        confirm_install(dep, cx).await
    }
}

async fn install_node_msi(cx: &mut StepContext) -> Result<(), InstallError> {
    cx.events.log(format!("downloading Node.js {NODE_VERSION}"));
    let dest = cx.options.resolved_temp_dir().join("node-installer.msi");
    fetch(
        &cx.client,
        NODE_MSI_MIRRORS,
        &dest,
        &cx.options.fetch,
        &cx.events,
        &cx.cancel,
    )
    .await?;

    cx.events.log("running the Node.js installer silently");
    let dest_arg = dest.to_string_lossy().into_owned();
    let spec = CommandSpec::new("msiexec").args([
        "/i",
        dest_arg.as_str(),
        "/qn",
        "/norestart",
        "ADDLOCAL=ALL",
        "ALLUSERS=1",
    ]);
    let result = run_silent(cx, &spec, msi_exit_reason).await;
    let _ = std::fs::remove_file(&dest);
    result
}

async fn install_git_exe(cx: &mut StepContext) -> Result<(), InstallError> {
    let dest = cx.options.resolved_temp_dir().join("git-installer.exe");
    fetch(
        &cx.client,
        GIT_WINDOWS_MIRRORS,
        &dest,
        &cx.options.fetch,
        &cx.events,
        &cx.cancel,
    )
    .await?;

    cx.events.log("running the Git installer silently");
    let spec = CommandSpec::new(dest.to_string_lossy().into_owned()).args([
        "/VERYSILENT",
        "/NORESTART",
        "/NOCANCEL",
        "/SP-",
        "/CLOSEAPPLICATIONS",
        "/RESTARTAPPLICATIONS",
    ]);
    let result = run_silent(cx, &spec, |code| {
        format!("Git installer exited with code {code}")
    })
    .await;
    let _ = std::fs::remove_file(&dest);
    result
}

async fn run_silent(
    cx: &mut StepContext,
    spec: &CommandSpec,
    reason_for: impl Fn(i32) -> String,
) -> Result<(), InstallError> {
    let status = run_streaming(spec, &cx.resolved, &cx.events, &cx.cancel).await?;
    if status.success() {
        return Ok(());
    }
    match status.code() {
        Some(code) => Err(InstallError::InstallerFailed {
            code: Some(code),
            reason: reason_for(code),
        }),
        None => Err(InstallError::from_exit("installer", None)),
    }
}

/// Human-actionable reasons for the MSI exit codes users actually hit.
fn msi_exit_reason(code: i32) -> String {
    match code {
        1603 => "Node.js installer failed (1603): another installation may be in progress, \
                 or administrator permissions are required; retry after a reboot"
            .to_string(),
        1638 => "Node.js installer failed (1638): another version is already installed; \
                 uninstall the existing Node.js first"
            .to_string(),
        code => format!("Node.js installer exited with code {code}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_reports_windows() {
        assert_eq!(WindowsStrategy.os(), "windows");
    }

    #[test]
    fn test_msi_exit_reason_known_codes() {
        let r1603 = msi_exit_reason(1603);
        assert!(r1603.contains("1603"));
        assert!(r1603.contains("another installation"));

        let r1638 = msi_exit_reason(1638);
        assert!(r1638.contains("1638"));
        assert!(r1638.contains("already installed"));
    }

    #[test]
    fn test_msi_exit_reason_generic_carries_code() {
        let generic = msi_exit_reason(217);
        assert!(generic.contains("217"));
        assert!(!generic.contains("1603"));
    }
}
