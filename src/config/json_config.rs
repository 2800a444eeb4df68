//! JSON config file handling: read-merge-write on an open key space.

use crate::config::api::{API_BASE_URL, MAX_CONCURRENT_REQUESTS};
use crate::config::ConfigError;
use crate::events::EventSender;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

/// Primary config file in the home directory.
pub(crate) const CONFIG_FILE_NAME: &str = ".claude.json";

/// Backup read when the primary is missing.
pub(crate) const BACKUP_FILE_NAME: &str = ".claude.json.backup";

/// Secondary settings file removed on restore.
pub(crate) const SETTINGS_FILE_REL: &str = ".claude/settings.json";

/// Set the managed keys, leaving every other key untouched.
pub(crate) fn merge_managed_keys(
    mut config: Map<String, Value>,
    api_key: &str,
    delay_ms: u32,
) -> Map<String, Value> {
    config.insert("hasCompletedOnboarding".to_string(), json!(true));
    config.insert("apiKey".to_string(), json!(api_key));
    config.insert("apiBaseUrl".to_string(), json!(API_BASE_URL));
    config.insert("requestDelayMs".to_string(), json!(delay_ms));
    config.insert(
        "maxConcurrentRequests".to_string(),
        json!(MAX_CONCURRENT_REQUESTS),
    );
    config
}

/// Read-merge-write the config file.
///
/// The existing file (or its backup, when the primary is missing) is read
/// as an open map so unknown keys round-trip unchanged; an unparseable
/// file is logged and replaced rather than aborting configuration.
pub(crate) fn write_config(
    home: &Path,
    api_key: &str,
    delay_ms: u32,
    events: &EventSender,
) -> Result<(), ConfigError> {
    let path = home.join(CONFIG_FILE_NAME);
    let existing = read_existing(&path, &home.join(BACKUP_FILE_NAME), events);
    let merged = merge_managed_keys(existing, api_key, delay_ms);

    let rendered = serde_json::to_string_pretty(&Value::Object(merged))?;
    write_with_fallbacks(&path, &rendered, events)?;
    events.log(format!("updated {}", path.display()));
    Ok(())
}

fn read_existing(path: &Path, backup: &Path, events: &EventSender) -> Map<String, Value> {
    let source = if path.exists() {
        path
    } else if backup.exists() {
        events.log("primary config missing, reading the backup");
        backup
    } else {
        return Map::new();
    };

    match std::fs::read_to_string(source) {
        Ok(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                events.log(format!(
                    "could not parse {}, starting a fresh config",
                    source.display()
                ));
                Map::new()
            }
        },
        Err(error) => {
            events.log(format!("could not read {}: {error}", source.display()));
            Map::new()
        }
    }
}

/// Write, retrying with progressively more permissive creation strategies.
fn write_with_fallbacks(path: &Path, content: &str, events: &EventSender) -> Result<(), ConfigError> {
    let last = match std::fs::write(path, content) {
        Ok(()) => return Ok(()),
        Err(error) => {
            events.log(format!("config write failed ({error}), retrying"));
            error
        }
    };

    #[cfg(unix)]
    {
        use std::io::Write as _;
        use std::os::unix::fs::OpenOptionsExt;
        let opened = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o666)
            .open(path);
        if let Ok(mut file) = opened {
            if file.write_all(content.as_bytes()).is_ok() {
                events.log("config written with permissive permissions");
                return Ok(());
            }
        }
    }

    {
        use std::io::Write as _;
        if let Ok(mut file) = std::fs::File::create(path) {
            if file.write_all(content.as_bytes()).is_ok() {
                events.log("config written via explicit create");
                return Ok(());
            }
        }
    }

    events.log(format!(
        "all strategies to write {} failed",
        path.display()
    ));
    Err(ConfigError::Write {
        path: path.to_path_buf(),
        source: last,
    })
}

/// Delete the config files this crate manages.
pub(crate) fn remove_config_files(home: &Path, events: &EventSender) -> Result<(), ConfigError> {
    let mut first_error: Option<ConfigError> = None;
    for rel in [CONFIG_FILE_NAME, SETTINGS_FILE_REL] {
        let path: PathBuf = home.join(rel);
        if !path.exists() {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => events.log(format!("removed {}", path.display())),
            Err(source) => {
                events.log(format!("could not remove {}: {source}", path.display()));
                first_error.get_or_insert(ConfigError::Write { path, source });
            }
        }
    }
    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
