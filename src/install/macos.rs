//! macOS install strategy: Homebrew first, direct .pkg artifact as fallback.

use crate::fetch::fetch;
use crate::install::artifacts::{
    HOMEBREW_INSTALL_URL, HOMEBREW_MIRROR_ENVS, NODE_PKG_MIRRORS, NODE_VERSION,
};
use crate::install::platform::{
    confirm_install, npm_install_cli, short_circuit_if_present, sleep_cancellable,
    PlatformStrategy,
};
use crate::install::InstallError;
use crate::pipeline::StepContext;
use crate::probe::probe_in_context;
use crate::runner::{run_captured, run_streaming, CommandSpec};
use crate::Dependency;
use async_trait::async_trait;
use std::time::Duration;

/// How long to wait for the Xcode Command Line Tools dialog flow.
const XCODE_CLT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const XCODE_CLT_MAX_POLLS: usize = 90;

pub(crate) struct MacStrategy;

#[async_trait]
impl PlatformStrategy for MacStrategy {
    fn os(&self) -> &'static str {
        "macos"
    }

    async fn install(&self, dep: Dependency, cx: &mut StepContext) -> Result<(), InstallError> {
        if short_circuit_if_present(dep, cx).await? {
            return Ok(());
        }

        match dep {
            Dependency::NodeJs => install_node(cx).await?,
            Dependency::Git => install_git(cx).await?,
            Dependency::ClaudeCli => npm_install_cli(cx, "npm").await?,
        }

        confirm_install(dep, cx).await
    }
}

async fn install_node(cx: &mut StepContext) -> Result<(), InstallError> {
    if !brew_available(cx).await {
        cx.events
            .log("Homebrew not detected, bootstrapping it first");
        let bootstrapped = bootstrap_homebrew(cx).await.is_ok() && brew_available(cx).await;
        if !bootstrapped {
            // Covers a dismissed password prompt too: the direct installer
            // will prompt again on its own.
            cx.events
                .log("Homebrew bootstrap did not complete, falling back to the direct installer");
            return install_node_pkg(cx).await;
        }
    }

    if brew_install(cx, "node").await.is_ok() {
        return Ok(());
    }
    cx.events
        .log("Homebrew install failed, falling back to the direct installer");
    install_node_pkg(cx).await
}

async fn install_git(cx: &mut StepContext) -> Result<(), InstallError> {
    if brew_available(cx).await {
        if brew_install(cx, "git").await.is_ok() {
            return Ok(());
        }
        cx.events
            .log("Homebrew install failed, trying Xcode Command Line Tools");
    }
    install_xcode_clt(cx).await
}

/// Whether a working `brew` is reachable.
async fn brew_available(cx: &StepContext) -> bool {
    let spec = CommandSpec::new("brew").args(["--version"]);
    matches!(run_captured(&spec, &cx.resolved).await, Ok((status, _)) if status.success())
}

/// `brew install <formula>`, with mirror configuration applied only when the
/// user has none of their own.
async fn brew_install(cx: &mut StepContext, formula: &str) -> Result<(), InstallError> {
    let use_mirror = std::env::var_os("HOMEBREW_BOTTLE_DOMAIN").is_none();
    if use_mirror {
        cx.events.log("using Homebrew mirror configuration");
    } else {
        cx.events
            .log("existing Homebrew mirror configuration detected, keeping it");
    }

    let with_mirror_envs = |mut spec: CommandSpec| {
        if use_mirror {
            for (key, value) in HOMEBREW_MIRROR_ENVS {
                spec = spec.env(*key, *value);
            }
        }
        spec
    };

    let update = with_mirror_envs(CommandSpec::new("brew").args(["update"]));
    match run_streaming(&update, &cx.resolved, &cx.events, &cx.cancel).await {
        Ok(status) if !status.success() => {
            cx.events
                .log("brew update failed, attempting install anyway");
        }
        Ok(_) => {}
        Err(error) => return Err(error.into()),
    }

    let install = with_mirror_envs(CommandSpec::new("brew").args(["install", formula]));
    let status = run_streaming(&install, &cx.resolved, &cx.events, &cx.cancel).await?;
    if !status.success() {
        return Err(InstallError::from_exit(
            &format!("brew install {formula}"),
            status.code(),
        ));
    }
    Ok(())
}

/// Bootstrap Homebrew. Requires administrator privileges, so this is one of
/// the two places a shell string is unavoidable: the elevation prompt.
async fn bootstrap_homebrew(cx: &mut StepContext) -> Result<(), InstallError> {
    cx.events
        .log("installing Homebrew (the system will ask for your password)");

    let shell_line = format!("/bin/bash -c \\\"$(curl -fsSL {HOMEBREW_INSTALL_URL})\\\"");
    run_elevated(cx, &shell_line, "Homebrew bootstrap").await
}

/// Download the Node.js .pkg from the mirror list and install it elevated.
async fn install_node_pkg(cx: &mut StepContext) -> Result<(), InstallError> {
    cx.events.log(format!("downloading Node.js {NODE_VERSION}"));
    let dest = cx.options.resolved_temp_dir().join("node-installer.pkg");
    fetch(
        &cx.client,
        NODE_PKG_MIRRORS,
        &dest,
        &cx.options.fetch,
        &cx.events,
        &cx.cancel,
    )
    .await?;

    cx.events
        .log("installing Node.js (the system will ask for your password)");
    let shell_line = format!("installer -pkg '{}' -target /", dest.display());
    let result = run_elevated(cx, &shell_line, "Node.js installer").await;

    // The staged installer is no longer needed either way.
    let _ = std::fs::remove_file(&dest);
    result
}

/// Run a command line with administrator privileges via the system prompt.
async fn run_elevated(
    cx: &mut StepContext,
    shell_line: &str,
    what: &str,
) -> Result<(), InstallError> {
    let script = format!("do shell script \"{shell_line}\" with administrator privileges");
    let spec = CommandSpec::new("osascript").args(["-e", script.as_str()]);

    let (status, output) = run_captured(&spec, &cx.resolved).await?;
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        cx.events.log(line);
    }

    if status.success() {
        return Ok(());
    }
    if output.contains("User canceled") {
        return Err(InstallError::PrivilegeEscalationCancelled);
    }
    Err(InstallError::from_exit(what, status.code()))
}

/// Trigger the Xcode Command Line Tools dialog and poll until Git appears.
async fn install_xcode_clt(cx: &mut StepContext) -> Result<(), InstallError> {
    cx.events.log(
        "installing Xcode Command Line Tools (includes Git); confirm the system dialog when it appears",
    );

    // Errors out when the tools are already present; either way we poll.
    let trigger = CommandSpec::new("xcode-select").args(["--install"]);
    if let Ok((_, output)) = run_captured(&trigger, &cx.resolved).await {
        for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
            cx.events.log(line);
        }
    }

    for _ in 0..XCODE_CLT_MAX_POLLS {
        sleep_cancellable(XCODE_CLT_POLL_INTERVAL, &cx.cancel).await?;
        let status = probe_in_context(
            Dependency::Git,
            &cx.probe_options(),
            &mut cx.resolved,
            &cx.events,
        )
        .await;
        if status.is_usable() {
            return Ok(());
        }
    }

    Err(InstallError::InstallerFailed {
        code: None,
        reason: "Xcode Command Line Tools installation did not complete; run 'xcode-select --install' manually".to_string(),
    })
}
