//! Version output parsing with regex extraction.

use crate::{Dependency, ProbeError};
use regex::Regex;
use semver::Version;

/// Parse a semantic version from CLI output.
///
/// Extracts a `major.minor.patch` triple from arbitrary version output:
///
/// - `v20.10.0` -> 20.10.0
/// - `git version 2.50.1` -> 2.50.1
/// - `2.1.12 (Claude Code)` -> 2.1.12
pub(crate) fn parse_version(output: &str) -> Result<Version, ProbeError> {
    let re = Regex::new(r"(\d+)\.(\d+)\.(\d+)").expect("Invalid regex pattern");

    if let Some(caps) = re.captures(output) {
        let version_str = caps.get(0).expect("Capture group 0 should exist").as_str();
        Version::parse(version_str).map_err(|_| ProbeError::VersionParseFailed)
    } else {
        Err(ProbeError::VersionParseFailed)
    }
}

/// Validate a parsed version against the dependency's minimum major.
///
/// Returns `Ok(version)` when acceptable. A below-minimum major is a
/// distinct outcome from a missing tool: the caller turns it into
/// `ProbeStatus::VersionTooLow` so the user sees "too old", not "absent".
pub(crate) fn validate_version(
    dep: Dependency,
    version: Version,
) -> Result<Version, (Version, u64)> {
    match dep.minimum_major() {
        Some(min) if version.major < min => Err((version, min)),
        _ => Ok(version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_node_version() {
        let result = parse_version("v20.10.0\n").unwrap();
        assert_eq!(result, Version::new(20, 10, 0));
    }

    #[test]
    fn test_parse_git_version() {
        let result = parse_version("git version 2.50.1").unwrap();
        assert_eq!(result, Version::new(2, 50, 1));
    }

    #[test]
    fn test_parse_claude_version() {
        let result = parse_version("2.1.12 (Claude Code)").unwrap();
        assert_eq!(result, Version::new(2, 1, 12));
    }

    #[test]
    fn test_parse_version_multiline() {
        let output = "Some Tool\nVersion: 1.0.0\nBuilt on 2025-01-01";
        let result = parse_version(output).unwrap();
        assert_eq!(result, Version::new(1, 0, 0));
    }

    #[test]
    fn test_parse_version_no_match() {
        let result = parse_version("no version here");
        assert!(matches!(result, Err(ProbeError::VersionParseFailed)));
    }

    #[test]
    fn test_parse_version_incomplete() {
        let result = parse_version("version 1.2");
        assert!(matches!(result, Err(ProbeError::VersionParseFailed)));
    }

    #[test]
    fn test_validate_accepts_minimum_and_above() {
        let v16 = Version::new(16, 0, 0);
        assert!(validate_version(Dependency::NodeJs, v16).is_ok());
        let v20 = Version::new(20, 10, 0);
        assert!(validate_version(Dependency::NodeJs, v20).is_ok());
    }

    #[test]
    fn test_validate_rejects_below_minimum() {
        let v14 = Version::new(14, 21, 3);
        let err = validate_version(Dependency::NodeJs, v14).unwrap_err();
        assert_eq!(err, (Version::new(14, 21, 3), 16));
    }

    #[test]
    fn test_validate_no_minimum_always_accepts() {
        let old = Version::new(0, 1, 0);
        assert!(validate_version(Dependency::Git, old).is_ok());
    }
}
