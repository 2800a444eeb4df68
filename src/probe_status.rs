//! Probe status types representing dependency detection results.

use semver::Version;
use std::path::{Path, PathBuf};

/// How a probe located the executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOrigin {
    /// Found through the regular PATH lookup.
    PathLookup,
    /// Found by scanning a well-known install directory that was not on PATH.
    ///
    /// The directory is recorded in the run's [`crate::ResolvedPaths`] so
    /// later steps can spawn the tool without a shell restart.
    FallbackDir,
}

/// Metadata for a dependency that was found and validated.
#[derive(Debug, Clone)]
pub struct ProbeMetadata {
    /// Path to the executable.
    pub path: PathBuf,

    /// Parsed version reported by the tool.
    pub version: Version,

    /// Where the executable was located.
    pub origin: ProbeOrigin,
}

/// Typed error variants for probe failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error types
/// in future versions.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProbeError {
    /// Timed out while invoking the tool's version flag.
    Timeout,

    /// Permission denied accessing the executable.
    PermissionDenied,

    /// The tool ran but its version output could not be parsed.
    VersionParseFailed,

    /// I/O error during the probe (e.g. failed to execute the command).
    IoError,
}

impl ProbeError {
    /// Human-readable description of the error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use claude_provision::ProbeError;
    ///
    /// assert_eq!(ProbeError::Timeout.description(), "Probe timed out");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "Probe timed out",
            Self::PermissionDenied => "Permission denied",
            Self::VersionParseFailed => "Failed to parse version",
            Self::IoError => "I/O error during probe",
        }
    }
}

/// Result of probing for one dependency.
///
/// # Variants
///
/// - `Found`: dependency present and version-valid, with full metadata
/// - `NotFound`: dependency definitively absent
/// - `VersionTooLow`: present, but below the required major version
/// - `Unknown`: the probe itself failed
///
/// `VersionTooLow` is deliberately distinct from `NotFound`: an installer
/// strategy treats the former as "present but unusable" and the pipeline
/// reports it differently to the user.
///
/// # Example
///
/// ```rust
/// use claude_provision::ProbeStatus;
///
/// fn report(status: &ProbeStatus) {
///     if status.is_usable() {
///         println!("ready at {:?}", status.path());
///     } else {
///         println!("needs install");
///     }
/// }
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ProbeStatus {
    /// Dependency is installed and meets the version requirement.
    Found(ProbeMetadata),

    /// Dependency is definitively not installed.
    NotFound,

    /// Dependency found but its major version is below the minimum.
    VersionTooLow {
        /// The version that was found.
        found: Version,
        /// The minimum accepted major version.
        required_major: u64,
        /// Path where the executable was found.
        path: PathBuf,
    },

    /// The probe failed with an error.
    Unknown {
        /// Typed error variant for programmatic handling.
        error: ProbeError,
        /// Human-readable message for the log.
        message: String,
    },
}

impl ProbeStatus {
    /// Check if the dependency is usable (present and version-valid).
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Check if the executable exists on disk, regardless of version.
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Found(_) | Self::VersionTooLow { .. })
    }

    /// Path to the executable, if one was located.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found(meta) => Some(&meta.path),
            Self::VersionTooLow { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Version of the dependency, if one was parsed.
    pub fn version(&self) -> Option<&Version> {
        match self {
            Self::Found(meta) => Some(&meta.version),
            Self::VersionTooLow { found, .. } => Some(found),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_metadata() -> ProbeMetadata {
        ProbeMetadata {
            path: PathBuf::from("/usr/bin/node"),
            version: Version::parse("20.10.0").unwrap(),
            origin: ProbeOrigin::PathLookup,
        }
    }

    #[test]
    fn test_found_status() {
        let status = ProbeStatus::Found(make_metadata());

        assert!(status.is_usable());
        assert!(status.is_installed());
        assert_eq!(status.path(), Some(Path::new("/usr/bin/node")));
        assert_eq!(status.version(), Some(&Version::new(20, 10, 0)));
    }

    #[test]
    fn test_not_found_status() {
        let status = ProbeStatus::NotFound;

        assert!(!status.is_usable());
        assert!(!status.is_installed());
        assert!(status.path().is_none());
        assert!(status.version().is_none());
    }

    #[test]
    fn test_version_too_low_status() {
        let status = ProbeStatus::VersionTooLow {
            found: Version::new(14, 21, 3),
            required_major: 16,
            path: PathBuf::from("/usr/bin/node"),
        };

        assert!(!status.is_usable());
        assert!(status.is_installed());
        assert_eq!(status.path(), Some(Path::new("/usr/bin/node")));
        assert_eq!(status.version(), Some(&Version::new(14, 21, 3)));
    }

    #[test]
    fn test_unknown_status() {
        let status = ProbeStatus::Unknown {
            error: ProbeError::Timeout,
            message: "Timed out after 5s".to_string(),
        };

        assert!(!status.is_usable());
        assert!(!status.is_installed());
        assert!(status.path().is_none());
        assert!(status.version().is_none());
    }

    #[test]
    fn test_probe_error_descriptions() {
        assert_eq!(ProbeError::Timeout.description(), "Probe timed out");
        assert_eq!(ProbeError::PermissionDenied.description(), "Permission denied");
        assert_eq!(
            ProbeError::VersionParseFailed.description(),
            "Failed to parse version"
        );
        assert_eq!(ProbeError::IoError.description(), "I/O error during probe");
    }
}
