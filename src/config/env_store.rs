//! Environment persistence: shell profiles, the Windows user registry, and
//! disposable launch scripts.

use crate::config::api::{vars, ApiConfiguration, API_BASE_URL, PROFILE_MARKER};
use crate::config::ConfigError;
use crate::events::EventSender;
use crate::runner::{run_captured, CommandSpec};
use crate::ResolvedPaths;
use std::path::{Path, PathBuf};

/// Outcome of one profile-file write attempt.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ProfileWrite {
    /// The block was appended.
    Written,
    /// The marker is already present; nothing was changed.
    AlreadyConfigured,
    /// The profile file does not exist; it is never created.
    Missing,
}

/// Profile files targeted when persisting, chosen by the login shell.
pub(crate) fn configure_profiles(home: &Path, shell: Option<&str>, os: &str) -> Vec<PathBuf> {
    let shell = shell.unwrap_or("");
    if shell.contains("zsh") {
        vec![home.join(".zshrc")]
    } else if shell.contains("bash") {
        // macOS login shells read .bash_profile, most Linux setups .bashrc
        if os == "macos" {
            vec![home.join(".bash_profile")]
        } else {
            vec![home.join(".bashrc")]
        }
    } else if shell.contains("fish") {
        vec![home.join(".config/fish/config.fish")]
    } else {
        vec![home.join(".profile")]
    }
}

/// Profile files cleaned during restore.
///
/// Wider than the configure list: bash may have used either file over the
/// tool's history, and `.profile` is always checked as a backstop.
pub(crate) fn restore_profiles(home: &Path, shell: Option<&str>) -> Vec<PathBuf> {
    let shell = shell.unwrap_or("");
    let mut profiles = if shell.contains("zsh") {
        vec![home.join(".zshrc")]
    } else if shell.contains("bash") {
        vec![home.join(".bashrc"), home.join(".bash_profile")]
    } else if shell.contains("fish") {
        vec![home.join(".config/fish/config.fish")]
    } else {
        Vec::new()
    };
    profiles.push(home.join(".profile"));
    profiles
}

/// The marked block appended to a shell profile.
pub(crate) fn profile_block(api: &ApiConfiguration, delay_ms: u32) -> String {
    format!(
        "\n{PROFILE_MARKER}\n\
         export {base}=\"{API_BASE_URL}\"\n\
         export {key}=\"{api_key}\"\n\
         export {delay}=\"{delay_ms}\"\n\
         export {max}=\"1\"\n\
         unset {auth}\n",
        base = vars::BASE_URL,
        key = vars::API_KEY,
        api_key = api.api_key,
        delay = vars::REQUEST_DELAY_MS,
        max = vars::MAX_CONCURRENT,
        auth = vars::AUTH_TOKEN,
    )
}

/// Append the marked block to a profile, once.
pub(crate) fn append_profile_block(path: &Path, block: &str) -> Result<ProfileWrite, ConfigError> {
    if !path.exists() {
        return Ok(ProfileWrite::Missing);
    }

    let existing = std::fs::read_to_string(path).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    if existing.contains(PROFILE_MARKER) {
        return Ok(ProfileWrite::AlreadyConfigured);
    }

    use std::io::Write as _;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    file.write_all(block.as_bytes())
        .map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(ProfileWrite::Written)
}

/// Remove the marked block from profile content.
///
/// Line heuristic kept compatible with what earlier releases wrote and
/// deleted: the marker line starts the skip, `export ANTHROPIC_*` /
/// `export CLAUDE_*` lines (and anything else inside the block, like the
/// `unset`) are dropped, and a blank line or a non-export comment ends the
/// skip. A single blank line immediately before the marker is absorbed so
/// a configure/restore round trip leaves the file byte-identical.
pub(crate) fn strip_profile_block(content: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut skipping = false;

    for line in content.split('\n') {
        if line.contains(PROFILE_MARKER) {
            if kept.last().is_some_and(|l| l.trim().is_empty()) {
                kept.pop();
            }
            skipping = true;
            continue;
        }

        if skipping {
            let trimmed = line.trim();
            if trimmed.starts_with("export ANTHROPIC_") || trimmed.starts_with("export CLAUDE_") {
                continue;
            }
            if trimmed.is_empty() || (!trimmed.starts_with("export") && trimmed.starts_with('#')) {
                skipping = false;
            }
        }

        if !skipping {
            kept.push(line);
        }
    }

    kept.join("\n")
}

/// Strip the marked block from one profile file, writing only on change.
pub(crate) fn restore_profile(path: &Path, events: &EventSender) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let stripped = strip_profile_block(&content);
    if stripped != content {
        std::fs::write(path, stripped).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        events.log(format!("cleaned configuration from {}", path.display()));
    }
    Ok(())
}

/// Path of the disposable launch script for this platform.
pub(crate) fn temp_script_path(temp: &Path, os: &str) -> PathBuf {
    if os == "windows" {
        temp.join("claude_k2_setup.bat")
    } else {
        temp.join("claude_k2_setup.sh")
    }
}

/// Write the disposable launch script: same variables, session lifetime.
pub(crate) fn write_temp_script(
    temp: &Path,
    api: &ApiConfiguration,
    delay_ms: u32,
    os: &str,
    events: &EventSender,
) -> Result<PathBuf, ConfigError> {
    let path = temp_script_path(temp, os);
    let contents = if os == "windows" {
        format!(
            "@echo off\r\n\
             REM {PROFILE_MARKER}\r\n\
             set \"{base}={API_BASE_URL}\"\r\n\
             set \"{key}={api_key}\"\r\n\
             set \"{delay}={delay_ms}\"\r\n\
             set \"{max}=1\"\r\n\
             set \"{auth}=\"\r\n\
             echo environment configured for {redacted}\r\n\
             echo you can now run the claude command\r\n",
            base = vars::BASE_URL,
            key = vars::API_KEY,
            api_key = api.api_key,
            delay = vars::REQUEST_DELAY_MS,
            max = vars::MAX_CONCURRENT,
            auth = vars::AUTH_TOKEN,
            redacted = api.redacted_key(),
        )
    } else {
        format!(
            "#!/bin/bash\n\
             {PROFILE_MARKER}\n\
             export {base}=\"{API_BASE_URL}\"\n\
             export {key}=\"{api_key}\"\n\
             export {delay}=\"{delay_ms}\"\n\
             export {max}=\"1\"\n\
             unset {auth}\n\
             echo \"environment configured for {redacted}\"\n\
             echo \"you can now run the claude command\"\n",
            base = vars::BASE_URL,
            key = vars::API_KEY,
            api_key = api.api_key,
            delay = vars::REQUEST_DELAY_MS,
            max = vars::MAX_CONCURRENT,
            auth = vars::AUTH_TOKEN,
            redacted = api.redacted_key(),
        )
    };

    std::fs::write(&path, &contents).map_err(|source| ConfigError::Write {
        path: path.clone(),
        source,
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755));
    }

    events.log(format!("session launch script written to {}", path.display()));
    Ok(path)
}

/// Persist the variables into the Windows per-user environment.
///
/// One `setx` per variable; failures are logged per variable and the first
/// one is reported after all were attempted. The auth token is cleared
/// from the user registry alongside, always.
pub(crate) async fn persist_windows_env(
    api: &ApiConfiguration,
    delay_ms: u32,
    events: &EventSender,
    resolved: &ResolvedPaths,
) -> Result<(), ConfigError> {
    let values = [
        (vars::BASE_URL, API_BASE_URL.to_string()),
        (vars::API_KEY, api.api_key.clone()),
        (vars::REQUEST_DELAY_MS, delay_ms.to_string()),
        (vars::MAX_CONCURRENT, "1".to_string()),
    ];

    let mut first_error: Option<ConfigError> = None;
    for (name, value) in values {
        let spec = CommandSpec::new("setx").args([name, value.as_str()]);
        match run_captured(&spec, resolved).await {
            Ok((status, _)) if status.success() => {
                events.log(format!("persisted user environment variable {name}"));
            }
            Ok((status, output)) => {
                events.log(format!(
                    "failed to persist {name} (exit {:?}): {}",
                    status.code(),
                    output.trim()
                ));
                first_error.get_or_insert(ConfigError::EnvStore {
                    variable: name.to_string(),
                });
            }
            Err(error) => {
                events.log(format!("failed to persist {name}: {error}"));
                first_error.get_or_insert(error.into());
            }
        }
    }

    // Clearing the conflicting auth method must accompany setting the key.
    let clear = CommandSpec::new("reg").args([
        "delete",
        r"HKCU\Environment",
        "/v",
        vars::AUTH_TOKEN,
        "/f",
    ]);
    if let Ok((status, _)) = run_captured(&clear, resolved).await {
        if status.success() {
            events.log(format!("cleared {}", vars::AUTH_TOKEN));
        }
    }

    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Clear all managed variables from the Windows per-user environment.
pub(crate) async fn clear_windows_env(events: &EventSender, resolved: &ResolvedPaths) {
    let all = [
        vars::BASE_URL,
        vars::API_KEY,
        vars::AUTH_TOKEN,
        vars::REQUEST_DELAY_MS,
        vars::MAX_CONCURRENT,
    ];
    for name in all {
        let spec = CommandSpec::new("reg").args(["delete", r"HKCU\Environment", "/v", name, "/f"]);
        match run_captured(&spec, resolved).await {
            Ok((status, _)) if status.success() => {
                events.log(format!("cleared user environment variable {name}"));
            }
            // Missing variables and launch failures are both fine here;
            // restore is best-effort per variable.
            _ => {}
        }
    }
}
