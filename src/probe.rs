//! Dependency detection probes.

use crate::detection::{
    check_version, executable_file_name, fallback_dirs, locate_on_path, parse_version,
    validate_version,
};
use crate::events::EventSender;
use crate::{Dependency, ProbeMetadata, ProbeOptions, ProbeOrigin, ProbeStatus, ResolvedPaths};
use std::ffi::OsStr;
use std::path::PathBuf;

/// Probe for a single dependency with default options.
///
/// The probe runs three stages, stopping at the first success:
///
/// 1. PATH lookup (diagnostic: logs where the tool appears to live)
/// 2. Direct invocation of the version flag, output parsed and validated
/// 3. Scan of well-known install directories, invoking any executable found
///
/// A version below the dependency's minimum major is reported as
/// [`ProbeStatus::VersionTooLow`], distinct from [`ProbeStatus::NotFound`].
///
/// # Example
///
/// ```rust,no_run
/// use claude_provision::{probe, Dependency};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let status = probe(Dependency::Git).await;
///     if status.is_usable() {
///         println!("Git is installed at {:?}", status.path());
///     }
/// }
/// ```
pub async fn probe(dep: Dependency) -> ProbeStatus {
    probe_with_options(dep, &ProbeOptions::default()).await
}

/// Probe for a single dependency with custom options.
pub async fn probe_with_options(dep: Dependency, options: &ProbeOptions) -> ProbeStatus {
    let sink = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let events = EventSender::sink_only(sink, "probe");
    let mut resolved = ResolvedPaths::default();
    probe_in_context(dep, options, &mut resolved, &events).await
}

/// Probe within a pipeline run, recording fallback discoveries.
///
/// This is the form the pipeline steps use: the shared [`ResolvedPaths`]
/// carries any directory discovered in stage 3 forward to later steps, and
/// diagnostics land in the run's log.
pub(crate) async fn probe_in_context(
    dep: Dependency,
    options: &ProbeOptions,
    resolved: &mut ResolvedPaths,
    events: &EventSender,
) -> ProbeStatus {
    let name = dep.executable_name();

    // Stage 1: PATH lookup, diagnostic only
    let located = locate_on_path(name);
    if let Some(path) = &located {
        events.log(format!("{dep} appears on PATH at {}", path.display()));
    }

    // Stage 2: direct invocation through PATH (plus directories already resolved)
    let path_env = resolved.path_env();
    let direct = check_version(
        OsStr::new(name),
        dep.version_args(),
        options.timeout,
        Some(&path_env),
    )
    .await;

    match direct {
        Ok(output) => {
            let path = located.unwrap_or_else(|| PathBuf::from(name));
            return status_from_output(dep, &output, path, ProbeOrigin::PathLookup, events);
        }
        Err(error) => {
            tracing::debug!(dependency = name, ?error, "direct invocation failed");
        }
    }

    // Stage 3: well-known install directories
    let home = dirs::home_dir();
    let os = std::env::consts::OS;
    let dirs = fallback_dirs(dep, os, home.as_deref());
    let file_name = executable_file_name(dep, os);
    if let Some(status) =
        scan_fallback_dirs(dep, &dirs, &file_name, options, resolved, events).await
    {
        return status;
    }

    events.log(format!("{dep} not detected"));
    ProbeStatus::NotFound
}

/// Check each candidate directory for a working executable.
///
/// On success the directory is recorded in `resolved`, which is what lets
/// later steps of the same run spawn the tool without a shell restart.
pub(crate) async fn scan_fallback_dirs(
    dep: Dependency,
    dirs: &[PathBuf],
    file_name: &str,
    options: &ProbeOptions,
    resolved: &mut ResolvedPaths,
    events: &EventSender,
) -> Option<ProbeStatus> {
    for dir in dirs {
        let candidate = dir.join(file_name);
        if !candidate.exists() {
            continue;
        }
        events.log(format!("found {dep} candidate at {}", candidate.display()));

        match check_version(
            candidate.as_os_str(),
            dep.version_args(),
            options.timeout,
            None,
        )
        .await
        {
            Ok(output) => {
                let status = status_from_output(
                    dep,
                    &output,
                    candidate.clone(),
                    ProbeOrigin::FallbackDir,
                    events,
                );
                if status.is_installed() {
                    resolved.record(dep, dir.clone());
                    events.log(format!("recorded {} for later steps", dir.display()));
                }
                return Some(status);
            }
            Err(error) => {
                events.log(format!(
                    "could not run {}: {}",
                    candidate.display(),
                    error.description()
                ));
            }
        }
    }
    None
}

/// Turn raw version output into a probe status.
fn status_from_output(
    dep: Dependency,
    output: &str,
    path: PathBuf,
    origin: ProbeOrigin,
    events: &EventSender,
) -> ProbeStatus {
    let version = match parse_version(output) {
        Ok(v) => v,
        Err(error) => {
            return ProbeStatus::Unknown {
                error,
                message: format!("failed to parse {dep} version from: {}", output.trim()),
            };
        }
    };

    match validate_version(dep, version) {
        Ok(version) => {
            events.log(format!("detected {dep} {version}"));
            ProbeStatus::Found(ProbeMetadata {
                path,
                version,
                origin,
            })
        }
        Err((found, required_major)) => {
            events.log(format!(
                "{dep} {found} is below the required major version {required_major}"
            ));
            ProbeStatus::VersionTooLow {
                found,
                required_major,
                path,
            }
        }
    }
}
