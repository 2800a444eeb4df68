//! Linux install strategy: native package managers.

use crate::install::platform::{
    confirm_install, npm_install_cli, short_circuit_if_present, PlatformStrategy,
};
use crate::install::InstallError;
use crate::pipeline::StepContext;
use crate::runner::{run_streaming, CommandSpec};
use crate::Dependency;
use async_trait::async_trait;

/// Package managers tried in preference order.
const PACKAGE_MANAGERS: &[&str] = &["apt-get", "dnf", "yum"];

pub(crate) struct LinuxStrategy;

#[async_trait]
impl PlatformStrategy for LinuxStrategy {
    fn os(&self) -> &'static str {
        "linux"
    }

    async fn install(&self, dep: Dependency, cx: &mut StepContext) -> Result<(), InstallError> {
        if short_circuit_if_present(dep, cx).await? {
            return Ok(());
        }

        match dep {
            Dependency::NodeJs => install_with_manager(cx, &["nodejs", "npm"]).await?,
            Dependency::Git => install_with_manager(cx, &["git"]).await?,
            Dependency::ClaudeCli => npm_install_cli(cx, "npm").await?,
        }

        confirm_install(dep, cx).await
    }
}

/// Install packages through the first available package manager.
async fn install_with_manager(
    cx: &mut StepContext,
    packages: &[&str],
) -> Result<(), InstallError> {
    let manager = PACKAGE_MANAGERS
        .iter()
        .find(|manager| which::which(manager).is_ok())
        .ok_or_else(|| InstallError::InstallerFailed {
            code: None,
            reason: format!(
                "no supported package manager found (tried {})",
                PACKAGE_MANAGERS.join(", ")
            ),
        })?;

    cx.events
        .log(format!("installing {} via {manager}", packages.join(" ")));

    if *manager == "apt-get" {
        // A stale index makes apt-get miss packages; a failed refresh is
        // logged and the install still attempted.
        let update = CommandSpec::new("sudo").args(["apt-get", "update"]);
        match run_streaming(&update, &cx.resolved, &cx.events, &cx.cancel).await {
            Ok(status) if !status.success() => {
                cx.events
                    .log("apt-get update failed, attempting install anyway");
            }
            Ok(_) => {}
            Err(error) => return Err(error.into()),
        }
    }

    let mut args = vec![*manager, "install", "-y"];
    args.extend(packages);
    let install = CommandSpec::new("sudo").args(args);

    let status = run_streaming(&install, &cx.resolved, &cx.events, &cx.cancel).await?;
    if !status.success() {
        return Err(InstallError::from_exit(
            &format!("{manager} install"),
            status.code(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_order_starts_with_apt() {
        assert_eq!(PACKAGE_MANAGERS[0], "apt-get");
        assert_eq!(PACKAGE_MANAGERS.len(), 3);
    }

    #[test]
    fn test_strategy_reports_linux() {
        assert_eq!(LinuxStrategy.os(), "linux");
    }
}
