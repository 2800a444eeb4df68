//! # claude-provision
//!
//! Provisioning core for a desktop onboarding installer of the Claude Code
//! CLI. It detects what is missing (Node.js runtime, Git, the CLI itself),
//! installs it silently from mirrored sources, and writes the API
//! configuration the CLI needs to talk to an alternate endpoint.
//!
//! The graphical shell around it is a separate concern: this crate exposes
//! the operations the UI calls and streams progress and log events back
//! over a bounded channel that never blocks the pipeline on a slow
//! consumer.
//!
//! ## Surface
//!
//! - [`Provisioner::install`] runs the weighted install pipeline
//! - [`Provisioner::configure_api`] writes credentials into config stores
//! - [`Provisioner::restore_configuration`] reverses everything written
//! - [`Provisioner::logs`] snapshots the durable log
//! - [`probe`] answers "is this tool usable?" standalone
//!
//! ## Example
//!
//! ```rust,no_run
//! use claude_provision::{Provisioner, ProvisionOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provisioner = Provisioner::new(ProvisionOptions::default());
//!
//!     let mut events = provisioner.install();
//!     while let Some(event) = events.recv().await {
//!         match event.fraction {
//!             Some(fraction) => println!("{:>5.1}% {}", fraction * 100.0, event.message),
//!             None => println!("      {}", event.message),
//!         }
//!     }
//! }
//! ```

mod config;
mod dependency;
mod detection;
mod events;
mod fetch;
mod install;
mod options;
mod orchestrator;
mod pipeline;
mod probe;
mod probe_status;
mod resolved;
mod runner;

pub use config::{ApiConfiguration, ConfigError, API_BASE_URL};
pub use dependency::Dependency;
pub use events::ProgressEvent;
pub use fetch::{FetchError, FetchOptions};
pub use install::InstallError;
pub use options::ProbeOptions;
pub use orchestrator::{ProvisionOptions, Provisioner};
pub use probe::{probe, probe_with_options};
pub use probe_status::{ProbeError, ProbeMetadata, ProbeOrigin, ProbeStatus};
pub use resolved::ResolvedPaths;
pub use runner::RunError;
