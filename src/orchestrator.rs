//! The provisioning orchestrator: the surface the presentation layer calls.

use crate::config::{self, ApiConfiguration, ConfigError, ConfigTargets};
use crate::events::{EventSender, LogSink, ProgressEvent, EVENT_CHANNEL_CAPACITY};
use crate::fetch::{http_client, FetchOptions};
use crate::install::artifacts::DEFAULT_NPM_REGISTRY;
use crate::pipeline::{install_steps, run_steps, StepContext};
use crate::{ProbeOptions, ResolvedPaths};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Configuration for a [`Provisioner`].
///
/// Defaults target the real user environment; tests point `home_dir` and
/// `temp_dir` at scratch directories so no real profile or config file is
/// ever touched.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Home directory override. Default: the user's home directory.
    pub home_dir: Option<PathBuf>,

    /// Temp directory override for staged installers and launch scripts.
    /// Default: the OS temp directory.
    pub temp_dir: Option<PathBuf>,

    /// Login shell override used to pick profile files. Default: `$SHELL`.
    pub shell: Option<String>,

    /// npm registry used for the CLI install.
    pub npm_registry: String,

    /// Probe behavior.
    pub probe: ProbeOptions,

    /// Download behavior.
    pub fetch: FetchOptions,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            home_dir: None,
            temp_dir: None,
            shell: None,
            npm_registry: DEFAULT_NPM_REGISTRY.to_string(),
            probe: ProbeOptions::default(),
            fetch: FetchOptions::default(),
        }
    }
}

impl ProvisionOptions {
    pub(crate) fn resolved_temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub(crate) fn resolved_home_dir(&self) -> Option<PathBuf> {
        self.home_dir.clone().or_else(dirs::home_dir)
    }

    pub(crate) fn resolved_shell(&self) -> Option<String> {
        self.shell.clone().or_else(|| std::env::var("SHELL").ok())
    }
}

/// Drives the provisioning pipeline and the configuration writer.
///
/// One instance backs one UI session. The install and configure phases
/// each stream [`ProgressEvent`]s over their own bounded channel and end
/// with a single terminal event; the durable log of every line is always
/// available through [`Provisioner::logs`].
///
/// # Example
///
/// ```rust,no_run
/// use claude_provision::{Provisioner, ProvisionOptions};
///
/// #[tokio::main]
/// async fn main() {
///     let provisioner = Provisioner::new(ProvisionOptions::default());
///     let mut events = provisioner.install();
///     while let Some(event) = events.recv().await {
///         println!("[{}] {}", event.step, event.message);
///     }
/// }
/// ```
pub struct Provisioner {
    options: Arc<ProvisionOptions>,
    sink: LogSink,
    cancel: CancellationToken,
}

impl Provisioner {
    /// Create a provisioner with the given options.
    pub fn new(options: ProvisionOptions) -> Self {
        Self {
            options: Arc::new(options),
            sink: Arc::new(Mutex::new(Vec::new())),
            cancel: CancellationToken::new(),
        }
    }

    /// Start the install phase in the background.
    ///
    /// Returns the event stream for this phase. The channel closes after
    /// the terminal event (completion at fraction 1.0, or the first fatal
    /// failure). Must be called from within a Tokio runtime.
    pub fn install(&self) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let options = self.options.clone();
        let sink = self.sink.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            run_install_phase(options, sink, cancel, tx).await;
        });
        rx
    }

    /// Snapshot of every log line recorded so far, across phases.
    pub fn logs(&self) -> Vec<String> {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Request cancellation of the running pipeline.
    ///
    /// The pipeline stops between steps; in-flight downloads and child
    /// processes are terminated promptly.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Write the API configuration into the configured stores.
    ///
    /// Environment persistence and the JSON config merge are independently
    /// fault-isolated: both always run, and the first failure is returned
    /// after both were attempted.
    pub async fn configure_api(&self, config: &ApiConfiguration) -> Result<(), ConfigError> {
        let targets = self.config_targets()?;
        let events = EventSender::sink_only(self.sink.clone(), "configure");
        config::apply(config, &targets, &events, &ResolvedPaths::default()).await
    }

    /// Configure phase with its own live event stream.
    ///
    /// Same work as [`Provisioner::configure_api`], run in the background
    /// with a channel that closes after this phase's terminal event.
    pub fn configure(&self, config: ApiConfiguration) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let sink = self.sink.clone();
        let targets = self.config_targets();

        tokio::spawn(async move {
            let events = EventSender::new(tx, sink, "configure");
            let targets = match targets {
                Ok(targets) => targets,
                Err(error) => {
                    events.fail("configure", 0.0, &error);
                    return;
                }
            };
            match config::apply(&config, &targets, &events, &ResolvedPaths::default()).await {
                Ok(()) => events.progress("configure", "configuration complete", 1.0),
                Err(error) => events.fail("configure", 0.0, &error),
            }
        });
        rx
    }

    /// Remove everything the configuration writer wrote.
    pub async fn restore_configuration(&self) -> Result<(), ConfigError> {
        let targets = self.config_targets()?;
        let events = EventSender::sink_only(self.sink.clone(), "restore");
        config::restore(&targets, &events, &ResolvedPaths::default()).await
    }

    fn config_targets(&self) -> Result<ConfigTargets, ConfigError> {
        let home = self
            .options
            .resolved_home_dir()
            .ok_or(ConfigError::NoHomeDir)?;
        Ok(ConfigTargets {
            home,
            temp: self.options.resolved_temp_dir(),
            shell: self.options.resolved_shell(),
            os: std::env::consts::OS,
        })
    }
}

async fn run_install_phase(
    options: Arc<ProvisionOptions>,
    sink: LogSink,
    cancel: CancellationToken,
    tx: mpsc::Sender<ProgressEvent>,
) {
    let events = EventSender::new(tx, sink, "pipeline");

    let client = match http_client(&options.fetch) {
        Ok(client) => client,
        Err(error) => {
            events.fail("environment check", 0.0, &error);
            return;
        }
    };

    let mut ctx = StepContext {
        events: events.clone(),
        resolved: ResolvedPaths::default(),
        cancel,
        options,
        client,
    };

    let outcome = run_steps(install_steps(), &mut ctx).await;
    tracing::debug!(?outcome, "install phase finished");
    // Dropping the last senders here closes the channel, exactly once.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default_registry() {
        let options = ProvisionOptions::default();
        assert_eq!(options.npm_registry, "https://registry.npmmirror.com");
        assert!(options.home_dir.is_none());
    }

    #[test]
    fn test_options_overrides_win() {
        let options = ProvisionOptions {
            home_dir: Some(PathBuf::from("/custom/home")),
            temp_dir: Some(PathBuf::from("/custom/tmp")),
            ..Default::default()
        };
        assert_eq!(
            options.resolved_home_dir(),
            Some(PathBuf::from("/custom/home"))
        );
        assert_eq!(options.resolved_temp_dir(), PathBuf::from("/custom/tmp"));
    }

    #[tokio::test]
    async fn test_logs_start_empty() {
        let provisioner = Provisioner::new(ProvisionOptions::default());
        assert!(provisioner.logs().is_empty());
    }

    #[tokio::test]
    async fn test_configure_api_records_logs() {
        let home = tempfile::tempdir().unwrap();
        let temp = tempfile::tempdir().unwrap();
        let provisioner = Provisioner::new(ProvisionOptions {
            home_dir: Some(home.path().to_path_buf()),
            temp_dir: Some(temp.path().to_path_buf()),
            shell: Some("/bin/zsh".to_string()),
            ..Default::default()
        });

        let config = ApiConfiguration {
            api_key: "sk-test-key".to_string(),
            requests_per_minute: 30,
            persist_system_wide: false,
        };
        provisioner.configure_api(&config).await.unwrap();

        assert!(!provisioner.logs().is_empty());
        assert!(home.path().join(".claude.json").exists());
    }
}
