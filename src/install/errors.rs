//! Error types for provisioning operations.

use crate::{Dependency, FetchError, RunError};
use semver::Version;
use thiserror::Error;

/// Errors that can occur while provisioning a dependency.
///
/// The taxonomy keeps user-distinguishable causes apart: a missing tool is
/// not a too-old tool, an exhausted download is not a failed installer, and
/// a dismissed password prompt is not an installer defect.
///
/// # Example
///
/// ```rust
/// use claude_provision::InstallError;
///
/// fn report(error: &InstallError) {
///     eprintln!("provisioning failed: {error}");
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstallError {
    /// The dependency is absent from the system.
    #[error("{0} is not installed")]
    NotFound(Dependency),

    /// The dependency exists but is older than the pipeline accepts.
    #[error("{dependency} {found} is below the required major version {required_major}")]
    VersionTooLow {
        /// Which dependency was too old.
        dependency: Dependency,
        /// The version that was found.
        found: Version,
        /// The minimum accepted major version.
        required_major: u64,
    },

    /// Fetching the installer artifact failed on every mirror.
    #[error("download failed: {0}")]
    Download(#[from] FetchError),

    /// The installer ran and reported failure.
    ///
    /// `reason` is already human-actionable where the exit code is a known
    /// one; otherwise it is the generic form carrying the code.
    #[error("{reason}")]
    InstallerFailed {
        /// Installer exit code, when one was produced.
        code: Option<i32>,
        /// Human-readable description of the failure.
        reason: String,
    },

    /// The user dismissed the platform's privilege-escalation prompt.
    #[error("the administrator password prompt was cancelled")]
    PrivilegeEscalationCancelled,

    /// An install reported success but the dependency never became usable.
    #[error("verification failed: {dependency} is not usable")]
    VerificationFailed {
        /// The dependency that could not be verified.
        dependency: Dependency,
    },

    /// Provisioning is not supported on this operating system.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// A subprocess could not be launched or supervised.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Filesystem error while staging an installer.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The run was cancelled.
    #[error("provisioning cancelled")]
    Cancelled,
}

impl InstallError {
    /// The installer exit code, when this error carries one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::InstallerFailed { code, .. } => *code,
            _ => None,
        }
    }

    /// Generic installer failure for an unmapped exit code.
    pub(crate) fn from_exit(what: &str, code: Option<i32>) -> Self {
        let reason = match code {
            Some(code) => format!("{what} exited with code {code}"),
            None => format!("{what} was terminated by a signal"),
        };
        Self::InstallerFailed { code, reason }
    }

    /// True when the error came from cancellation, at any layer.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Run(RunError::Cancelled) | Self::Download(FetchError::Cancelled)
        )
    }
}
