//! Weighted step pipeline: the provisioning state machine.
//!
//! Steps run strictly sequentially (installs have real ordering
//! dependencies), each advancing overall progress by its weight share.
//! A tolerant step's failure is logged and skipped over; a non-tolerant
//! failure is terminal. Exactly one terminal event is emitted per run.

use crate::events::EventSender;
use crate::install::platform;
use crate::install::InstallError;
use crate::orchestrator::ProvisionOptions;
use crate::probe::probe_in_context;
use crate::{Dependency, ProbeOptions, ProbeStatus, ResolvedPaths};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared state threaded through every step of one run.
pub(crate) struct StepContext {
    /// Event sender, re-scoped to the current step's name.
    pub events: EventSender,
    /// Tool directories discovered so far in this run.
    pub resolved: ResolvedPaths,
    /// Cancellation signal, checked between steps and inside suspension
    /// points.
    pub cancel: CancellationToken,
    /// Run configuration.
    pub options: Arc<ProvisionOptions>,
    /// HTTP client shared by all artifact downloads.
    pub client: reqwest::Client,
}

impl StepContext {
    pub(crate) fn probe_options(&self) -> ProbeOptions {
        self.options.probe.clone()
    }
}

/// One named, weighted pipeline step.
pub(crate) struct Step {
    pub name: &'static str,
    pub weight: f64,
    /// Log-and-continue on failure instead of aborting the pipeline.
    pub tolerant: bool,
    pub kind: StepKind,
}

/// What a step does when it runs.
pub(crate) enum StepKind {
    /// Validate that this OS is supported at all.
    CheckSystem,
    /// Probe for a dependency without installing it.
    Detect(Dependency),
    /// Ensure a dependency is installed.
    Install(Dependency),
    /// Re-probe everything after the installs.
    Verify,
    /// Test-only scripted step.
    #[cfg(test)]
    Synthetic(tests::SyntheticStep),
}

/// How a pipeline run ended.
#[derive(Debug)]
pub(crate) enum PipelineOutcome {
    Completed,
    Failed {
        step: &'static str,
        error: InstallError,
    },
    Cancelled,
}

/// The install-phase step table.
///
/// Detection steps are tolerant: their failure just means the following
/// install step has work to do. Weights reflect expected duration.
pub(crate) fn install_steps() -> Vec<Step> {
    vec![
        Step {
            name: "environment check",
            weight: 5.0,
            tolerant: false,
            kind: StepKind::CheckSystem,
        },
        Step {
            name: "detect Node.js",
            weight: 10.0,
            tolerant: true,
            kind: StepKind::Detect(Dependency::NodeJs),
        },
        Step {
            name: "install Node.js",
            weight: 20.0,
            tolerant: false,
            kind: StepKind::Install(Dependency::NodeJs),
        },
        Step {
            name: "detect Git",
            weight: 10.0,
            tolerant: true,
            kind: StepKind::Detect(Dependency::Git),
        },
        Step {
            name: "install Git",
            weight: 20.0,
            tolerant: false,
            kind: StepKind::Install(Dependency::Git),
        },
        Step {
            name: "install Claude Code",
            weight: 20.0,
            tolerant: false,
            kind: StepKind::Install(Dependency::ClaudeCli),
        },
        Step {
            name: "verify installation",
            weight: 5.0,
            tolerant: false,
            kind: StepKind::Verify,
        },
    ]
}

/// Drive the step sequence to its terminal state.
pub(crate) async fn run_steps(steps: Vec<Step>, ctx: &mut StepContext) -> PipelineOutcome {
    let base = ctx.events.clone();
    let cancel = ctx.cancel.clone();
    let total: f64 = steps.iter().map(|step| step.weight).sum();
    if total <= 0.0 {
        base.progress("complete", "nothing to do", 1.0);
        return PipelineOutcome::Completed;
    }

    let mut completed = 0.0;
    for step in steps {
        if cancel.is_cancelled() {
            base.fail(step.name, completed / total, &InstallError::Cancelled);
            return PipelineOutcome::Cancelled;
        }

        base.progress(
            step.name,
            format!("starting: {}", step.name),
            completed / total,
        );
        ctx.events = base.for_step(step.name);

        let action = run_action(step.kind, ctx);
        let result = tokio::select! {
            result = action => Some(result),
            () = cancel.cancelled() => None,
        };

        match result {
            None => {
                base.fail(step.name, completed / total, &InstallError::Cancelled);
                return PipelineOutcome::Cancelled;
            }
            Some(Ok(())) => {
                completed += step.weight;
                base.progress(
                    step.name,
                    format!("{} complete", step.name),
                    completed / total,
                );
            }
            Some(Err(error)) if error.is_cancelled() => {
                base.fail(step.name, completed / total, &InstallError::Cancelled);
                return PipelineOutcome::Cancelled;
            }
            Some(Err(error)) if step.tolerant => {
                ctx.events
                    .log(format!("{} failed, continuing: {error}", step.name));
                completed += step.weight;
                base.progress(
                    step.name,
                    format!("{} did not pass, continuing", step.name),
                    completed / total,
                );
            }
            Some(Err(error)) => {
                base.fail(step.name, completed / total, &error);
                return PipelineOutcome::Failed {
                    step: step.name,
                    error,
                };
            }
        }
    }

    base.progress("complete", "all components provisioned", 1.0);
    PipelineOutcome::Completed
}

async fn run_action(kind: StepKind, cx: &mut StepContext) -> Result<(), InstallError> {
    match kind {
        StepKind::CheckSystem => check_system(cx),
        StepKind::Detect(dep) => detect_dependency(cx, dep).await,
        StepKind::Install(dep) => install_dependency(cx, dep).await,
        StepKind::Verify => verify_installation(cx).await,
        #[cfg(test)]
        StepKind::Synthetic(step) => step.run(),
    }
}

fn check_system(cx: &mut StepContext) -> Result<(), InstallError> {
    cx.events
        .log(format!("operating system: {}", std::env::consts::OS));
    cx.events
        .log(format!("architecture: {}", std::env::consts::ARCH));

    match platform::current() {
        Some(_) => Ok(()),
        None => Err(InstallError::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        )),
    }
}

async fn detect_dependency(cx: &mut StepContext, dep: Dependency) -> Result<(), InstallError> {
    let status = probe_in_context(dep, &cx.probe_options(), &mut cx.resolved, &cx.events).await;
    match status {
        ProbeStatus::Found(_) => Ok(()),
        ProbeStatus::NotFound => Err(InstallError::NotFound(dep)),
        ProbeStatus::VersionTooLow {
            found,
            required_major,
            ..
        } => Err(InstallError::VersionTooLow {
            dependency: dep,
            found,
            required_major,
        }),
        ProbeStatus::Unknown { message, .. } => {
            cx.events.log(message);
            Err(InstallError::NotFound(dep))
        }
    }
}

async fn install_dependency(cx: &mut StepContext, dep: Dependency) -> Result<(), InstallError> {
    let platform = platform::current().ok_or_else(|| {
        InstallError::UnsupportedPlatform(std::env::consts::OS.to_string())
    })?;
    platform.install(dep, cx).await
}

async fn verify_installation(cx: &mut StepContext) -> Result<(), InstallError> {
    for dep in Dependency::all() {
        let status =
            probe_in_context(dep, &cx.probe_options(), &mut cx.resolved, &cx.events).await;
        if !status.is_usable() {
            return Err(InstallError::VerificationFailed { dependency: dep });
        }
    }
    cx.events.log("all components verified");
    Ok(())
}
