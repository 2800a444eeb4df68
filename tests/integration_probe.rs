//! Integration tests for dependency probes.
//!
//! These run against whatever is really installed on the host, so they
//! assert on status shape rather than a particular outcome.

use claude_provision::{probe, probe_with_options, Dependency, ProbeOptions, ProbeStatus};
use std::time::Duration;

#[tokio::test]
async fn test_probe_each_dependency_returns_valid_status() {
    for dep in Dependency::all() {
        let status = probe(dep).await;
        assert!(
            matches!(
                status,
                ProbeStatus::Found(_)
                    | ProbeStatus::NotFound
                    | ProbeStatus::VersionTooLow { .. }
                    | ProbeStatus::Unknown { .. }
            ),
            "unexpected status for {}: {:?}",
            dep.display_name(),
            status
        );
    }
}

#[tokio::test]
async fn test_probe_found_carries_real_path_and_version() {
    for dep in Dependency::all() {
        if let ProbeStatus::Found(meta) = probe(dep).await {
            assert!(
                meta.path.exists() || meta.path == std::path::PathBuf::from(dep.executable_name()),
                "{} path should exist: {:?}",
                dep.display_name(),
                meta.path
            );
            assert!(!meta.version.to_string().is_empty());
        }
    }
}

#[tokio::test]
async fn test_probe_is_deterministic() {
    let first = probe(Dependency::Git).await;
    let second = probe(Dependency::Git).await;

    match (&first, &second) {
        (ProbeStatus::Found(m1), ProbeStatus::Found(m2)) => {
            assert_eq!(m1.path, m2.path);
            assert_eq!(m1.version, m2.version);
        }
        (ProbeStatus::NotFound, ProbeStatus::NotFound) => {}
        (ProbeStatus::VersionTooLow { found: f1, .. }, ProbeStatus::VersionTooLow { found: f2, .. }) => {
            assert_eq!(f1, f2);
        }
        (ProbeStatus::Unknown { error: e1, .. }, ProbeStatus::Unknown { error: e2, .. }) => {
            assert_eq!(e1, e2);
        }
        _ => panic!("probe results differ: {first:?} vs {second:?}"),
    }
}

#[tokio::test]
async fn test_probe_with_short_timeout_still_returns() {
    let options = ProbeOptions {
        timeout: Duration::from_millis(500),
    };
    let status = probe_with_options(Dependency::ClaudeCli, &options).await;
    assert!(matches!(
        status,
        ProbeStatus::Found(_)
            | ProbeStatus::NotFound
            | ProbeStatus::VersionTooLow { .. }
            | ProbeStatus::Unknown { .. }
    ));
}
