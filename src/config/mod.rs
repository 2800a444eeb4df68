//! Configuration writer: API credentials into JSON config, shell profiles,
//! the Windows user registry, or a disposable launch script, plus the full
//! reverse operation.

mod api;
mod env_store;
mod json_config;

pub use api::{ApiConfiguration, API_BASE_URL};

use crate::events::EventSender;
use crate::runner::RunError;
use crate::ResolvedPaths;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from writing or restoring configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Requests-per-minute was zero.
    #[error("requests per minute must be greater than zero")]
    InvalidRateLimit,

    /// The home directory could not be determined.
    #[error("could not determine the home directory")]
    NoHomeDir,

    /// A config or profile file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The file that failed.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A persistent environment variable could not be stored.
    #[error("failed to persist environment variable {variable}")]
    EnvStore {
        /// The variable that failed.
        variable: String,
    },

    /// The merged configuration could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A helper process (setx, reg) failed to launch.
    #[error(transparent)]
    Run(#[from] RunError),
}

/// Where configuration lands: resolved once per operation from the
/// provisioner's options, injectable for tests.
#[derive(Debug, Clone)]
pub(crate) struct ConfigTargets {
    pub home: PathBuf,
    pub temp: PathBuf,
    pub shell: Option<String>,
    pub os: &'static str,
}

impl ConfigTargets {
    fn shell(&self) -> Option<&str> {
        self.shell.as_deref()
    }
}

/// Apply the full configuration: environment persistence and JSON merge.
///
/// The two sub-operations are fault-isolated: both always run, failures
/// are logged as they happen, and the first error (environment store
/// first) is reported once both have been attempted.
pub(crate) async fn apply(
    config: &ApiConfiguration,
    targets: &ConfigTargets,
    events: &EventSender,
    resolved: &ResolvedPaths,
) -> Result<(), ConfigError> {
    let delay_ms = config.request_delay_ms()?;
    events.log(format!(
        "configuring API access for {} ({} RPM, {delay_ms} ms between requests)",
        config.redacted_key(),
        config.requests_per_minute
    ));

    let env_result = write_environment(config, delay_ms, targets, events, resolved).await;
    if let Err(error) = &env_result {
        events.log(format!("environment persistence failed: {error}"));
    }

    let json_result = json_config::write_config(&targets.home, &config.api_key, delay_ms, events);
    if let Err(error) = &json_result {
        // Not pipeline-fatal: the environment variables alone are enough
        // for the CLI to work.
        events.log(format!("config file write failed: {error}"));
    }

    env_result.and(json_result)
}

async fn write_environment(
    config: &ApiConfiguration,
    delay_ms: u32,
    targets: &ConfigTargets,
    events: &EventSender,
    resolved: &ResolvedPaths,
) -> Result<(), ConfigError> {
    if targets.os == "windows" {
        if config.persist_system_wide {
            events.log("persisting user environment variables");
            return env_store::persist_windows_env(config, delay_ms, events, resolved).await;
        }
        env_store::write_temp_script(&targets.temp, config, delay_ms, targets.os, events)?;
        return Ok(());
    }

    if config.persist_system_wide {
        for profile in
            env_store::configure_profiles(&targets.home, targets.shell(), targets.os)
        {
            let block = env_store::profile_block(config, delay_ms);
            match env_store::append_profile_block(&profile, &block)? {
                env_store::ProfileWrite::Written => {
                    events.log(format!("environment added to {}", profile.display()));
                }
                env_store::ProfileWrite::AlreadyConfigured => {
                    events.log(format!(
                        "{} already configured, skipping",
                        profile.display()
                    ));
                }
                env_store::ProfileWrite::Missing => {
                    events.log(format!("{} does not exist, skipping", profile.display()));
                }
            }
        }
        events.log("open a new terminal or source your profile for the variables to take effect");
        return Ok(());
    }

    env_store::write_temp_script(&targets.temp, config, delay_ms, targets.os, events)?;
    Ok(())
}

/// Reverse everything [`apply`] did.
///
/// Deletes the managed JSON config files, strips the marked profile
/// sections (or clears the registry variables on Windows), and removes any
/// leftover launch script. Sub-operations are best-effort and independent;
/// the first error is reported after all have run.
pub(crate) async fn restore(
    targets: &ConfigTargets,
    events: &EventSender,
    resolved: &ResolvedPaths,
) -> Result<(), ConfigError> {
    events.log("restoring the original configuration");

    let mut first_error = json_config::remove_config_files(&targets.home, events).err();

    if targets.os == "windows" {
        env_store::clear_windows_env(events, resolved).await;
        let script = env_store::temp_script_path(&targets.temp, targets.os);
        if script.exists() && std::fs::remove_file(&script).is_ok() {
            events.log(format!("removed {}", script.display()));
        }
    } else {
        for profile in env_store::restore_profiles(&targets.home, targets.shell()) {
            if let Err(error) = env_store::restore_profile(&profile, events) {
                events.log(format!("could not clean {}: {error}", profile.display()));
                first_error.get_or_insert(error);
            }
        }
    }

    events.log("configuration restored to its initial state");
    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
